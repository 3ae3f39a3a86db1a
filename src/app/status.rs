use super::App;
use crate::types::StatusResponse;
use crate::util::format_hms;
use anyhow::Result;

impl App {
    pub(super) async fn status(&self, remote: &str) -> Result<()> {
        let project = self.project_url(remote)?;
        let status = self.client.check_status(&project).await?;
        self.console.write_str(&format_status(&status));
        Ok(())
    }
}

pub(super) fn format_status(status: &StatusResponse) -> String {
    let mut text = String::new();
    let has_errors = !status.error_logs.trim().is_empty();

    if status.lock_file_present {
        text.push_str("Project is getting processed and not ready for chat.\n");
        text.push_str(&format!(
            "Lock duration: {}\n",
            format_hms(status.lock_time_duration)
        ));
    } else if has_errors {
        text.push_str("Project encountered errors during processing and is not ready for chat.\n");
    } else {
        text.push_str("Project is ready for chat!\n");
    }

    if has_errors {
        text.push_str("\nError logs:\n");
        text.push_str(&status.error_logs);
        text.push('\n');
    }
    text
}
