use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::process::{Command, Output};

/// Thin wrapper over the `git` binary for one working tree.
#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
}

impl GitRepo {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Runs git and returns trimmed stdout, failing on a non-zero exit.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let details = if stderr.is_empty() { stdout } else { stderr };
            bail!("git {} failed: {}", args.join(" "), details);
        }
        Ok(stdout)
    }

    /// Runs git and hands back the raw output whatever the exit status.
    pub fn output(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(&self.dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .args(args)
            .output()
            .with_context(|| format!("Failed to execute git {}", args.join(" ")))
    }

    pub fn head_commit_hash(&self) -> Result<String> {
        self.run(&["rev-parse", "HEAD"])
            .context("Failed to resolve HEAD commit")
    }

    pub fn remote_url(&self, remote: &str) -> Result<String> {
        let url = self
            .run(&["remote", "get-url", remote])
            .with_context(|| format!("Failed to read URL of remote '{remote}'"))?;
        if url.is_empty() {
            bail!("remote '{remote}' has no URL");
        }
        Ok(url)
    }

    /// Current branch name, or `None` on a detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let name = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if name == "HEAD" || name.is_empty() {
            Ok(None)
        } else {
            Ok(Some(name))
        }
    }

    /// Fetches `remote` and reports whether any of its branches contains `oid`.
    pub fn commit_on_remote(&self, remote: &str, oid: &str) -> Result<bool> {
        self.run(&["fetch", remote, "--quiet"])
            .with_context(|| format!("failed to fetch from {remote}"))?;
        let branches = self
            .run(&["branch", "-r", "--contains", oid])
            .with_context(|| format!("failed to check {remote} branches for commit {oid}"))?;
        let prefix = format!("{remote}/");
        Ok(branches
            .lines()
            .map(str::trim)
            .any(|branch| branch.starts_with(&prefix)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo() -> (TempDir, GitRepo) {
        let temp = TempDir::new().expect("temp dir");
        let repo = GitRepo::new(temp.path());
        repo.run(&["init"]).expect("git init");
        repo.run(&["symbolic-ref", "HEAD", "refs/heads/main"])
            .expect("name branch");
        repo.run(&["config", "user.email", "mct@example.com"])
            .expect("config email");
        repo.run(&["config", "user.name", "mct test"])
            .expect("config name");
        fs::write(temp.path().join("a.txt"), "a\n").expect("seed");
        repo.run(&["add", "a.txt"]).expect("add");
        repo.run(&["commit", "-m", "init"]).expect("commit");
        (temp, repo)
    }

    #[test]
    fn test_head_and_branch() {
        let (_temp, repo) = init_repo();
        let head = repo.head_commit_hash().expect("head");
        assert_eq!(head.len(), 40);
        assert_eq!(repo.current_branch().unwrap().as_deref(), Some("main"));

        repo.run(&["checkout", "--detach"]).expect("detach");
        assert_eq!(repo.current_branch().unwrap(), None);
    }

    #[test]
    fn test_remote_url() {
        let (_temp, repo) = init_repo();
        assert!(repo.remote_url("origin").is_err());

        repo.run(&["remote", "add", "origin", "https://github.com/acme/widgets.git"])
            .expect("add remote");
        assert_eq!(
            repo.remote_url("origin").unwrap(),
            "https://github.com/acme/widgets.git"
        );
    }

    #[test]
    fn test_failed_command_reports_stderr() {
        let temp = TempDir::new().expect("temp dir");
        let err = GitRepo::new(temp.path())
            .run(&["rev-parse", "HEAD"])
            .unwrap_err();
        assert!(err.to_string().contains("git rev-parse HEAD failed"));
    }

    #[test]
    fn test_commit_on_remote() {
        let (temp, repo) = init_repo();
        let bare = temp.path().join("remote.git");
        GitRepo::new(temp.path())
            .run(&["init", "--bare", bare.to_str().unwrap()])
            .expect("bare remote");
        repo.run(&["remote", "add", "origin", bare.to_str().unwrap()])
            .expect("add remote");
        repo.run(&["push", "origin", "HEAD:refs/heads/main"])
            .expect("push");

        let pushed = repo.head_commit_hash().unwrap();
        assert!(repo.commit_on_remote("origin", &pushed).unwrap());

        fs::write(temp.path().join("b.txt"), "b\n").expect("write");
        repo.run(&["add", "b.txt"]).expect("add");
        repo.run(&["commit", "-m", "local only"]).expect("commit");
        let local = repo.head_commit_hash().unwrap();
        assert!(!repo.commit_on_remote("origin", &local).unwrap());

        assert!(repo.commit_on_remote("upstream", &pushed).is_err());
    }
}
