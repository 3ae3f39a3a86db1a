use crate::types::{AmplificationLevel, MatchStrength, ResponseMode};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_DEPTH: u32 = 10_000;

/// Chat with a git repository indexed by the machtiani service.
///
/// Run `mct <prompt words>` to ask a question, or one of the subcommands to
/// manage the repository on the service.
#[derive(Debug, Parser)]
#[command(name = "mct", version, args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub prompt: PromptArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index the current branch (or add the repository on first sync)
    Sync(SyncArgs),
    /// Show whether the repository is ready for chat
    Status(RemoteArgs),
    /// Delete the repository's index from the service
    Remove(RemoveArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RemoteArgs {
    /// Name of the git remote identifying the project
    #[arg(long, default_value = "origin")]
    pub remote: String,
}

#[derive(Debug, Clone, Args)]
pub struct PromptArgs {
    /// Prompt text; ignored when --file is given
    #[arg(value_name = "PROMPT")]
    pub words: Vec<String>,

    /// Model to answer with
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, value_enum, default_value_t = MatchStrength::Mid)]
    pub match_strength: MatchStrength,

    /// Only `default` writes patches and new files; `answer-only` prints the bare answer
    #[arg(long, value_enum, default_value_t = ResponseMode::Default)]
    pub mode: ResponseMode,

    /// Read the prompt from a markdown file; its stem names the saved chat
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub force: bool,

    #[arg(long)]
    pub verbose: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    #[arg(long, value_enum, default_value_t = AmplificationLevel::Off)]
    pub amplify: AmplificationLevel,

    /// Depth of commit history to index
    #[arg(long, default_value_t = DEFAULT_DEPTH, value_parser = clap::value_parser!(u32).range(1..))]
    pub depth: u32,

    /// Model used while indexing
    #[arg(long)]
    pub model: Option<String>,

    /// Parallel model requests while indexing
    #[arg(long)]
    pub model_threads: Option<u32>,

    /// Estimate token cost before syncing
    #[arg(long)]
    pub cost: bool,

    /// Estimate token cost and exit
    #[arg(long)]
    pub cost_only: bool,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub force: bool,

    #[arg(long)]
    pub verbose: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Debug, Clone, Args)]
pub struct RemoveArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl PromptArgs {
    pub fn is_answer_only(&self) -> bool {
        self.mode.is_answer_only()
    }
}
