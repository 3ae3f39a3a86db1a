use super::{App, VCS_TYPE};
use crate::api::ApiError;
use crate::cli::SyncArgs;
use crate::config::load_ignore_files;
use crate::types::{RepositoryRequest, SyncResponse, TokenCountRequest};
use crate::util::format_int_with_commas;
use anyhow::{bail, Context, Result};
use std::time::Instant;

const MISSING_REPO_MARKER: &str = "does not exist";

impl App {
    pub(super) async fn sync(&self, args: SyncArgs) -> Result<()> {
        let started = Instant::now();
        let project = self.project_url(&args.remote.remote)?;
        self.console.line(&format!("Using remote URL: {project}"));

        let head = self
            .repo
            .head_commit_hash()
            .context("Error retrieving HEAD commit hash")?;
        self.validate_head_on_remote(&args.remote.remote, &head, args.force)?;
        let branch = self.repo.current_branch().unwrap_or_else(|error| {
            tracing::warn!(error = %format!("{error:#}"), "unable to read current branch name");
            None
        });
        let ignore_files = load_ignore_files(&self.config.working_dir)?;

        let mut request = RepositoryRequest {
            codehost_url: project.clone(),
            project_name: project.clone(),
            vcs_type: VCS_TYPE.to_string(),
            api_key: self.config.code_host_api_key.clone(),
            llm_model_api_key: self.config.model_api_key.clone(),
            llm_model_base_url: self.config.model_base_url.clone(),
            llm_model: args.model.clone().unwrap_or_default(),
            ignore_files: ignore_files.clone(),
            head: head.clone(),
            use_mock_llm: false,
            amplification_level: args.amplify.as_str().to_string(),
            depth_level: args.depth,
            llm_threads: args.model_threads.filter(|threads| *threads > 0),
            branch_name: None,
            commit_oid: None,
        };

        if !self.repository_exists(&project).await? {
            self.console.line("\nRepository not found on Machtiani. Preparing for initial sync.");
            let mut listing = String::from("Ignoring files based on .machtiani.ignore:\n");
            if ignore_files.is_empty() {
                listing.push_str("No files to ignore.\n");
            } else {
                listing.push('\n');
                for path in &ignore_files {
                    listing.push_str(&format!("{path}\n"));
                }
            }
            self.console.write_str(&listing);

            if args.cost || args.cost_only {
                self.estimate_cost(&project, args.verbose, started).await?;
                if args.cost_only {
                    self.console
                        .line("Cost estimation complete. Exiting as requested by --cost-only.");
                    return Ok(());
                }
            }
            if !args.force && !self.confirm() {
                self.console.line("Operation cancelled by user.");
                return Ok(());
            }

            let response = self.client.add_repository(&request).await?;
            self.console.line(&response.message);
            self.console.line("---");
            self.console
                .line("Your repo is getting added to machtiani is in progress!");
            self.console
                .line("Please check back by running `mct status` to see if it completed.");
            return Ok(());
        }

        self.console.line(&format!(
            "Repository found. Preparing to sync branch: {}",
            branch.as_deref().unwrap_or_default()
        ));
        request.branch_name = branch;
        request.commit_oid = Some(head);

        if args.cost || args.cost_only {
            self.estimate_cost(&project, args.verbose, started).await?;
        }
        if args.cost_only {
            self.console
                .line("Cost estimation complete. Exiting as requested by --cost-only.");
            return Ok(());
        }
        if !args.force && !self.confirm() {
            self.console.line("Operation cancelled by user.");
            return Ok(());
        }

        let response = self.client.fetch_and_checkout(&request).await?;
        self.console.line(&format_sync_message(&response, &project));
        Ok(())
    }

    /// The service can only fetch commits that are on the remote. `force`
    /// downgrades a failed check to a warning.
    fn validate_head_on_remote(&self, remote: &str, head: &str, force: bool) -> Result<()> {
        let problem = match self.repo.commit_on_remote(remote, head) {
            Ok(true) => return Ok(()),
            Ok(false) => format!("local commit {head} does not exist on any {remote} branch"),
            Err(error) => format!("{error:#}"),
        };
        if !force {
            bail!("Validation failed: {problem}. Use --force to bypass this validation.");
        }
        self.console.line(&format!(
            "Warning: {problem}. Proceeding anyway due to --force flag."
        ));
        Ok(())
    }

    /// `false` when the service says it has never seen `project`.
    async fn repository_exists(&self, project: &str) -> Result<bool> {
        match self.client.check_status(project).await {
            Ok(_) => Ok(true),
            Err(error) => {
                let missing = match error.downcast_ref::<ApiError>() {
                    Some(ApiError::Status { body, .. }) => body.contains(MISSING_REPO_MARKER),
                    _ => false,
                };
                if missing {
                    Ok(false)
                } else {
                    Err(error.context("Error checking repository status"))
                }
            }
        }
    }

    async fn estimate_cost(&self, project: &str, verbose: bool, started: Instant) -> Result<()> {
        self.console.line("---");
        self.console.line("Estimating token cost...");
        let counts = self
            .client
            .token_count(&TokenCountRequest {
                codehost_url: project.to_string(),
                project_name: project.to_string(),
                vcs_type: VCS_TYPE.to_string(),
                api_key: self.config.code_host_api_key.clone(),
            })
            .await
            .context("error getting token count")?;
        tracing::debug!(embedding_tokens = counts.embedding_tokens, "token estimate");

        let inference = i64::try_from(counts.inference_tokens).unwrap_or(i64::MAX);
        self.console.line(&format!(
            "Estimated tokens: {}",
            format_int_with_commas(inference)
        ));
        self.console.line("---");
        if verbose {
            self.console.line(&format!(
                "Time until cost estimation finished: {:.2?}",
                started.elapsed()
            ));
        }
        Ok(())
    }
}

/// Last non-empty path segment of a project URL.
pub fn repo_name(project: &str) -> &str {
    project
        .trim_end_matches('/')
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(project)
}

/// Human summary of a sync; falls back to the raw body when the service did
/// not answer with the structured form.
pub fn format_sync_message(response: &SyncResponse, project: &str) -> String {
    if response.project_name.is_empty() && response.branch_name.is_empty() {
        return format!(
            "Successfully synced the repository: {project}.\nServer response: {}",
            response.message
        );
    }
    format!(
        "Successfully synced '{}' branch of {} to the chat service\n - service message: {}",
        response.branch_name,
        repo_name(&response.project_name),
        response.message
    )
}
