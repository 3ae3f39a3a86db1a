use crate::git::GitRepo;
use crate::types::UpdateFileContent;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const PATCH_EXTENSION: &str = "patch";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Outcome of writing one batch of patch files.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatchWriteSummary {
    /// One line per entry, in path order.
    pub lines: Vec<String>,
    pub written: Vec<PathBuf>,
}

impl PatchWriteSummary {
    /// All lines as one block, or an empty string when there was nothing to do.
    pub fn text(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut text = String::from("\n");
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplySummary {
    pub applied: usize,
    pub failed: usize,
}

/// Stages each usable update as `<patches_dir>/<sanitized>_<timestamp>.patch`.
///
/// Entries with a non-blank error or blank content are skipped. Existing
/// patch files are never overwritten.
pub fn write_patches(
    updates: &BTreeMap<String, UpdateFileContent>,
    patches_dir: &Path,
) -> PatchWriteSummary {
    let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
    write_patches_at(updates, patches_dir, &timestamp)
}

pub(crate) fn write_patches_at(
    updates: &BTreeMap<String, UpdateFileContent>,
    patches_dir: &Path,
    timestamp: &str,
) -> PatchWriteSummary {
    let mut summary = PatchWriteSummary::default();

    for (path, update) in updates {
        if let Some(error) = update.first_error() {
            tracing::warn!(path = %path, error, "server reported an error for file");
            summary.lines.push(format!(
                "Skipping patch creation for {path} due to errors during generation."
            ));
            continue;
        }
        if !update.has_content() {
            summary.lines.push(format!(
                "Skipping patch creation for {path} as updated content is empty."
            ));
            continue;
        }

        let stem = format!("{}_{timestamp}", sanitize_patch_name(path));
        match write_unique(patches_dir, &stem, &update.updated_content) {
            Ok(patch_path) => {
                summary.lines.push(format!(
                    "Wrote patch for {path} to {}",
                    patch_path.display()
                ));
                summary.written.push(patch_path);
            }
            Err(error) => {
                let target = patches_dir.join(format!("{stem}.{PATCH_EXTENSION}"));
                tracing::warn!(path = %path, error = %format!("{error:#}"), "failed to write patch");
                summary.lines.push(format!(
                    "Error writing patch for {path} to {}",
                    target.display()
                ));
            }
        }
    }

    summary
}

/// Replaces path separators and colons so a repo path becomes one file name.
pub fn sanitize_patch_name(path: &str) -> String {
    path.replace(['/', '\\', ':'], "_")
}

fn write_unique(dir: &Path, stem: &str, content: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut attempt = 1;
    loop {
        let name = if attempt == 1 {
            format!("{stem}.{PATCH_EXTENSION}")
        } else {
            format!("{stem}_{attempt}.{PATCH_EXTENSION}")
        };
        let candidate = dir.join(name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut file) => {
                file.write_all(content.as_bytes())
                    .with_context(|| format!("Failed to write {}", candidate.display()))?;
                return Ok(candidate);
            }
            Err(error) if error.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("Failed to create {}", candidate.display()))
            }
        }
    }
}

/// Every `*.patch` file directly inside `patches_dir`, sorted.
pub fn list_patch_files(patches_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = patches_dir.join(format!("*.{PATCH_EXTENSION}"));
    let pattern = pattern.to_string_lossy();
    let mut files = Vec::new();
    for entry in glob::glob(&pattern).context("Invalid patch directory pattern")? {
        match entry {
            Ok(path) => files.push(path),
            Err(error) => tracing::warn!(%error, "unreadable patch directory entry"),
        }
    }
    files.sort();
    Ok(files)
}

/// Applies every patch in `patches_dir` that is not in `baseline`.
///
/// Each patch is applied with `git apply --reject`, so matching hunks land and
/// the rest go to `.rej` files. Failures are counted, never returned.
pub fn apply_git_patches(repo: &GitRepo, patches_dir: &Path, baseline: &[PathBuf]) -> ApplySummary {
    let mut summary = ApplySummary::default();

    let current = match list_patch_files(patches_dir) {
        Ok(files) => files,
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), "could not list patch files");
            return summary;
        }
    };
    let known: HashSet<_> = baseline.iter().filter_map(|p| p.file_name()).collect();
    let fresh: Vec<_> = current
        .iter()
        .filter(|p| p.file_name().is_some_and(|name| !known.contains(name)))
        .collect();

    if fresh.is_empty() {
        tracing::info!("no new patch files to apply");
        return summary;
    }

    for patch in fresh {
        let patch_arg = patch.to_string_lossy();
        match repo.output(&["apply", "--stat", &patch_arg]) {
            Ok(output) => tracing::info!(
                patch = %patch.display(),
                stat = %String::from_utf8_lossy(&output.stdout).trim(),
                "patch preview"
            ),
            Err(error) => tracing::warn!(patch = %patch.display(), %error, "patch preview failed"),
        }

        match repo.run(&["apply", "--reject", "--whitespace=fix", &patch_arg]) {
            Ok(_) => {
                tracing::info!(patch = %patch.display(), "applied patch");
                summary.applied += 1;
            }
            Err(error) => {
                tracing::warn!(patch = %patch.display(), %error, "patch did not apply cleanly");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        applied = summary.applied,
        failed = summary.failed,
        "patch application finished"
    );
    summary
}
