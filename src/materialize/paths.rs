use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Resolves server-suggested relative paths against a working directory.
pub struct Workspace {
    root: PathBuf,
    canonical_root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let canonical_root = fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
        Self {
            root,
            canonical_root,
        }
    }

    /// Joins `path` onto the root, rejecting absolute paths, `..` components and
    /// anything that escapes the root through a symlink.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if path.trim().is_empty() {
            bail!("empty path");
        }
        if relative.is_absolute() || path.starts_with('/') || path.contains('\\') {
            bail!("absolute or platform-specific path not allowed: {path}");
        }
        for component in relative.components() {
            match component {
                Component::ParentDir => bail!("path traversal detected: {path}"),
                Component::Prefix(_) | Component::RootDir => {
                    bail!("absolute path not allowed: {path}")
                }
                Component::CurDir | Component::Normal(_) => {}
            }
        }

        let resolved = self.root.join(relative);
        self.ensure_within_root(&resolved)?;
        Ok(resolved)
    }

    fn ensure_within_root(&self, path: &Path) -> Result<()> {
        let mut guard = path;
        while !guard.exists() {
            guard = guard
                .parent()
                .context("could not find an existing parent path")?;
        }

        let canonical = fs::canonicalize(guard)
            .with_context(|| format!("Failed to canonicalize {}", guard.display()))?;
        if !canonical.starts_with(&self.canonical_root) {
            bail!("path escapes working directory: {}", path.display());
        }
        Ok(())
    }
}
