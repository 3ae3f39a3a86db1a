use super::paths::Workspace;
use crate::types::NewFilesData;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NewFilesSummary {
    pub text: String,
    pub written: usize,
    pub skipped: usize,
}

enum Outcome {
    Created,
    Skipped(&'static str),
    Failed(String),
}

/// Creates each suggested file that does not exist yet. Existing files are
/// never touched and one failing entry does not stop the rest.
pub fn write_new_files(data: Option<&NewFilesData>, workspace: &Workspace) -> NewFilesSummary {
    let mut summary = NewFilesSummary::default();
    let Some(data) = data else {
        summary.text = "No new files data available - skipping\n".to_string();
        return summary;
    };
    if data.new_content.is_empty() {
        summary.text = "New files content is empty - nothing to write\n".to_string();
        return summary;
    }

    summary.text = format!("Creating new files for {} entries\n", data.new_content.len());
    for (path, content) in &data.new_content {
        let line = match create_one(workspace, path, content) {
            Outcome::Created => {
                tracing::info!(path = %path, "created new file");
                summary.written += 1;
                format!("- Created {path}")
            }
            Outcome::Skipped(reason) => {
                summary.skipped += 1;
                format!("- {path} (skipped - {reason})")
            }
            Outcome::Failed(detail) => {
                tracing::warn!(path = %path, %detail, "failed to create new file");
                format!("- {path} ({detail})")
            }
        };
        summary.text.push_str(&line);
        summary.text.push('\n');
    }

    summary.text.push_str(&format!(
        "\nNew files processing complete - {} written, {} skipped\n",
        summary.written, summary.skipped
    ));
    summary
}

fn create_one(workspace: &Workspace, path: &str, content: &str) -> Outcome {
    if content.trim().is_empty() {
        return Outcome::Skipped("empty content");
    }
    let target = match workspace.resolve(path) {
        Ok(target) => target,
        Err(error) => return Outcome::Failed(format!("error resolving path: {error}")),
    };
    match target.try_exists() {
        Ok(true) => return Outcome::Skipped("file already exists"),
        Ok(false) => {}
        Err(error) => return Outcome::Failed(format!("error checking existence: {error}")),
    }

    if let Some(parent) = target.parent() {
        if let Err(error) = fs::create_dir_all(parent) {
            return Outcome::Failed(format!("error creating directories: {error}"));
        }
    }

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target);
    match file {
        Ok(mut file) => match file.write_all(content.as_bytes()) {
            Ok(()) => Outcome::Created,
            Err(error) => Outcome::Failed(format!("error writing file: {error}")),
        },
        Err(error) if error.kind() == ErrorKind::AlreadyExists => {
            Outcome::Skipped("file already exists")
        }
        Err(error) => Outcome::Failed(format!("error writing file: {error}")),
    }
}
