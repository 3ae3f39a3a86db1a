//! The `mct` workflows: prompt, sync, status and remove.

mod prompt;
mod remove;
mod status;
mod sync;

pub use prompt::{chat_file_stem, save_chat};
pub use sync::{format_sync_message, repo_name};

use crate::api::MachtianiClient;
use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::git::GitRepo;
use crate::terminal::Console;
use anyhow::{bail, Result};
use std::io::BufRead;

const SEPARATOR_WIDTH: usize = 60;
const CONFIRM_PROMPT: &str = "Do you wish to proceed? (y/n): ";
const VCS_TYPE: &str = "git";

pub struct App {
    config: Config,
    client: MachtianiClient,
    console: Console,
    repo: GitRepo,
}

impl App {
    pub fn new(config: Config, console: Console) -> Result<Self> {
        let client = MachtianiClient::new(&config)?;
        let repo = GitRepo::new(&config.working_dir);
        Ok(Self {
            config,
            client,
            console,
            repo,
        })
    }

    pub async fn run(&self, cli: Cli) -> Result<()> {
        self.check_compatibility().await?;
        match cli.command {
            Some(Command::Sync(args)) => self.sync(args).await,
            Some(Command::Status(args)) => self.status(&args.remote).await,
            Some(Command::Remove(args)) => self.remove(args).await,
            None => self.prompt(cli.prompt).await,
        }
    }

    /// Refuses to run against a service built from a different revision than
    /// this binary, when the binary knows its revision.
    async fn check_compatibility(&self) -> Result<()> {
        let Some(expected) = option_env!("MCT_HEAD_OID").filter(|oid| !oid.is_empty()) else {
            return Ok(());
        };

        let info = self.client.install_info().await?;
        if info.head_oid != expected {
            bail!(
                "This CLI is no longer compatible with the current environment. \
                 Please update to the latest version by following the below instructions\n\n{}",
                info.message
            );
        }
        Ok(())
    }

    /// URL of `remote`, falling back to `CODE_HOST_URL` when git has none.
    fn project_url(&self, remote: &str) -> Result<String> {
        match self.repo.remote_url(remote) {
            Ok(url) => Ok(url),
            Err(error) if !self.config.code_host_url.is_empty() => {
                tracing::warn!(error = %format!("{error:#}"), "using CODE_HOST_URL as project");
                Ok(self.config.code_host_url.clone())
            }
            Err(error) => Err(error),
        }
    }

    fn confirm(&self) -> bool {
        let stdin = std::io::stdin();
        confirm_proceed(&self.console, stdin.lock())
    }
}

/// A banner line block, or a bare rule when `message` is empty.
pub fn separator(message: &str) -> String {
    let rule = "=".repeat(SEPARATOR_WIDTH);
    if message.is_empty() {
        format!("\n{rule}\n")
    } else {
        format!("\n{rule}\n{message}\n{rule}\n")
    }
}

/// Asks for confirmation; only "y" (any case) proceeds.
pub fn confirm_proceed(console: &Console, mut input: impl BufRead) -> bool {
    console.write_str(CONFIRM_PROMPT);
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
        Err(error) => {
            tracing::warn!(%error, "could not read confirmation");
            false
        }
    }
}
