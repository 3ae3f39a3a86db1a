use super::blocks::BlockAccumulator;
use crate::spinner::Spinner;
use crate::terminal::Console;
use crate::types::{NewFilesData, UpdateFileContent};
use crate::ui::MarkdownRender;
use std::collections::BTreeMap;
use std::sync::Arc;

const USER_MARKER: &str = "# User";

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Collect everything silently and print the raw transcript once at the end.
    pub answer_only: bool,
    /// Leave the spinner running after a successful stream; the caller stops it
    /// before it prints anything else.
    pub defer_spinner_stop: bool,
}

/// Everything a finished generation stream produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedResponse {
    /// Header plus rendered blocks as they were shown, plus the paths trailer.
    pub clean_transcript: String,
    /// Header plus every token verbatim, plus the paths trailer. This is what gets saved.
    pub raw_transcript: String,
    pub retrieved_paths: Vec<String>,
    pub file_updates: BTreeMap<String, UpdateFileContent>,
    pub new_files: Option<NewFilesData>,
}

/// Decodes a generation stream, rendering blocks as they complete.
pub struct ResponseStreamer {
    pub(super) console: Console,
    pub(super) renderer: Arc<dyn MarkdownRender>,
    pub(super) spinner: Spinner,
}

impl ResponseStreamer {
    pub fn new(console: Console, renderer: Arc<dyn MarkdownRender>, spinner: Spinner) -> Self {
        Self {
            console,
            renderer,
            spinner,
        }
    }

    pub fn spinner(&self) -> &Spinner {
        &self.spinner
    }
}

/// Per-call accumulators, owned by a single `generate` call.
#[derive(Default)]
pub(super) struct StreamRun {
    pub answer_only: bool,
    pub blocks: BlockAccumulator,
    pub clean: String,
    pub raw: String,
    pub answer_buffer: String,
    pub answer_tokens: String,
    pub retrieved_paths: Vec<String>,
    pub file_updates: BTreeMap<String, UpdateFileContent>,
    pub new_files: Option<NewFilesData>,
}

impl StreamRun {
    pub fn new(answer_only: bool, header: &str) -> Self {
        let mut run = Self {
            answer_only,
            ..Default::default()
        };
        run.clean.push_str(header);
        run.raw.push_str(header);
        if answer_only {
            run.answer_buffer.push_str(header);
        }
        run
    }

    pub fn into_response(self) -> GeneratedResponse {
        GeneratedResponse {
            clean_transcript: self.clean,
            raw_transcript: self.raw,
            retrieved_paths: self.retrieved_paths,
            file_updates: self.file_updates,
            new_files: self.new_files,
        }
    }
}

/// Frames a prompt as the opening of a chat transcript.
pub fn conversation_header(prompt: &str) -> String {
    if prompt.trim().starts_with(USER_MARKER) {
        format!("{prompt}\n# Assistant\n\n")
    } else {
        format!("{USER_MARKER}\n\n{prompt}\n\n# Assistant\n\n")
    }
}

pub fn retrieved_paths_trailer(paths: &[String]) -> String {
    let mut trailer = String::from("\n\n---\n\n# Retrieved File Paths\n\n");
    for path in paths {
        trailer.push_str("- ");
        trailer.push_str(path);
        trailer.push('\n');
    }
    trailer
}
