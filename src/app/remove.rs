use super::{App, VCS_TYPE};
use crate::cli::RemoveArgs;
use crate::types::DeleteStoreRequest;
use anyhow::Result;

impl App {
    pub(super) async fn remove(&self, args: RemoveArgs) -> Result<()> {
        let project = self.project_url(&args.remote.remote)?;
        self.console.line(&format!("Using remote URL: {project}"));

        if !args.force && !self.confirm() {
            self.console.line("Operation aborted by user.");
            return Ok(());
        }

        let request = DeleteStoreRequest {
            project_name: project.clone(),
            codehost_url: project,
            vcs_type: VCS_TYPE.to_string(),
            api_key: self.config.code_host_api_key.clone(),
        };
        let response = self.client.delete_store(&request).await?;
        self.console.line(&response.message);
        Ok(())
    }
}
