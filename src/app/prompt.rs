use super::{separator, App};
use crate::cli::PromptArgs;
use crate::config::load_ignore_files;
use crate::materialize::{
    apply_git_patches, list_patch_files, write_new_files, write_patches, Workspace, PATCHES_DIR,
};
use crate::spinner::Spinner;
use crate::state::{GenerateOptions, GeneratedResponse, ResponseStreamer};
use crate::types::GenerateRequest;
use crate::ui::{MarkdownRender, PlainMarkdown, TerminalMarkdown};
use crate::util::truncate_chars;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const CHAT_DIR: &str = ".machtiani/chat";
const FALLBACK_CHAT_NAME: &str = "machtiani-response";
const VERBOSE_PROMPT_CHARS: usize = 200;

impl App {
    pub(super) async fn prompt(&self, args: PromptArgs) -> Result<()> {
        let started = Instant::now();
        let answer_only = args.is_answer_only();
        let prompt = read_prompt(&args)?;
        let ignore_files = load_ignore_files(&self.config.working_dir)?;

        let project = self.project_url(&args.remote.remote)?;
        if !answer_only {
            self.console.line(&format!("Using remote URL: {project}"));
        }
        if args.verbose && !answer_only {
            self.print_verbose(&args, &prompt, &ignore_files);
        }

        let head_commit_hash = self.repo.head_commit_hash().unwrap_or_else(|error| {
            tracing::warn!(error = %format!("{error:#}"), "sending prompt without HEAD commit");
            String::new()
        });

        let request = GenerateRequest {
            prompt: prompt.clone(),
            project: project.clone(),
            mode: args.mode.as_str().to_string(),
            model: args.model.clone(),
            match_strength: args.match_strength.as_str().to_string(),
            llm_model_api_key: self.config.model_api_key.clone(),
            llm_model_api_key_other: self.config.model_api_key_other.clone(),
            llm_model_base_url: self.config.model_base_url.clone(),
            llm_model_base_url_other: self.config.model_base_url_other.clone(),
            codehost_api_key: self.config.code_host_api_key.clone().unwrap_or_default(),
            codehost_url: project,
            ignore_files,
            head_commit_hash,
        };
        let stream = self.client.generate_response(&request).await?;

        let interactive = self.console.is_interactive();
        let spinner = if interactive && !answer_only {
            Spinner::new(self.console.clone())
        } else {
            Spinner::disabled()
        };
        let renderer: Arc<dyn MarkdownRender> = if interactive {
            Arc::new(TerminalMarkdown::new())
        } else {
            Arc::new(PlainMarkdown)
        };
        let streamer = ResponseStreamer::new(self.console.clone(), renderer, spinner);

        let materialize = args.mode.materializes_files();
        let response = streamer
            .generate(
                stream,
                &prompt,
                GenerateOptions {
                    answer_only,
                    defer_spinner_stop: materialize,
                },
            )
            .await?;

        if materialize {
            self.materialize(&response, streamer.spinner()).await;
        }
        if answer_only {
            return Ok(());
        }

        self.console.write_str(&separator("Saving Chat Response"));
        let name = self.chat_name(args.file.as_deref(), &prompt).await;
        match save_chat(&self.config.working_dir, &name, &response.raw_transcript) {
            Ok(path) => self
                .console
                .line(&format!("Response saved to {}", path.display())),
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "could not save chat response");
                self.console.line("\n--- Start Fallback Response Output ---");
                self.console.line(&response.raw_transcript);
                self.console.line("--- End Fallback Response Output ---");
            }
        }

        self.console.line(&format!(
            "Total response handling took {:.2?}",
            started.elapsed()
        ));
        Ok(())
    }

    /// Stages patches, applies the new ones and creates suggested files. Never
    /// fails; problems end up in the printed summaries.
    async fn materialize(&self, response: &GeneratedResponse, spinner: &Spinner) {
        let root = &self.config.working_dir;
        let patches_dir = root.join(PATCHES_DIR);

        spinner.stop().await;
        self.console
            .write_str(&separator("Writing & Applying File Patches"));

        let baseline = list_patch_files(&patches_dir).unwrap_or_else(|error| {
            tracing::warn!(error = %format!("{error:#}"), "error finding existing patch files");
            Vec::new()
        });
        let written = write_patches(&response.file_updates, &patches_dir);
        self.console.write_str(&written.text());

        let applied = apply_git_patches(&self.repo, &patches_dir, &baseline);
        if applied.applied + applied.failed > 0 {
            self.console.line(&format!(
                "Applied {} patch file(s), {} failed",
                applied.applied, applied.failed
            ));
        }

        self.console.write_str(&separator("Writing New Files"));
        let created = write_new_files(response.new_files.as_ref(), &Workspace::new(root));
        self.console.write_str(&created.text);
        self.console.write_str(&separator(""));
    }

    async fn chat_name(&self, file: Option<&Path>, prompt: &str) -> String {
        if let Some(stem) = file.and_then(chat_file_stem) {
            return stem;
        }
        match self.client.generate_filename(prompt, &self.config).await {
            Ok(name) => name.replace(['/', '\\'], "_"),
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "error generating filename, using default");
                FALLBACK_CHAT_NAME.to_string()
            }
        }
    }

    fn print_verbose(&self, args: &PromptArgs, prompt: &str, ignore_files: &[String]) {
        let mut text = String::from("Parsed file paths from machtiani.ignore:\n");
        if ignore_files.is_empty() {
            text.push_str("  (No ignore rules found or file doesn't exist)\n");
        }
        for path in ignore_files {
            text.push_str(&format!("  {path}\n"));
        }

        let file = args
            .file
            .as_ref()
            .map(|f| f.display().to_string())
            .unwrap_or_default();
        text.push_str("Arguments passed:\n");
        text.push_str(&format!("  Markdown file: {file}\n"));
        text.push_str(&format!("  Model: {}\n", args.model));
        text.push_str(&format!("  Match strength: {}\n", args.match_strength.as_str()));
        text.push_str(&format!("  Mode: {}\n", args.mode.as_str()));
        text.push_str(&format!("  Force: {}\n", args.force));
        text.push_str(&format!(
            "  Prompt: {}\n",
            truncate_chars(prompt, VERBOSE_PROMPT_CHARS)
        ));
        self.console.write_str(&text);
    }
}

fn read_prompt(args: &PromptArgs) -> Result<String> {
    if let Some(file) = &args.file {
        return fs::read_to_string(file)
            .with_context(|| format!("Error reading markdown file {}", file.display()));
    }
    let prompt = args.words.join(" ");
    if prompt.trim().is_empty() {
        bail!("No prompt provided. Please provide either a prompt or a markdown file.");
    }
    Ok(prompt)
}

/// File name of `path` with every extension removed, if anything is left.
pub fn chat_file_stem(path: &Path) -> Option<String> {
    let mut name = PathBuf::from(path.file_name()?);
    while name.extension().is_some() {
        name = PathBuf::from(name.file_stem()?);
    }
    let name = name.to_string_lossy().to_string();
    (!name.is_empty() && name != ".").then_some(name)
}

/// Writes the transcript to `<root>/.machtiani/chat/<name>.md`.
pub fn save_chat(root: &Path, name: &str, transcript: &str) -> Result<PathBuf> {
    let dir = root.join(CHAT_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("{name}.md"));
    fs::write(&path, transcript).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
