use wavecheck::HarvestProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: HarvestProgress) {
        match event {
            HarvestProgress::OrgStarted { org } => {
                tracing::info!(org = %org, "Processing organization");
            }

            HarvestProgress::ReposEnumerated { org, count } => {
                tracing::info!(org = %org, count, "Enumerated repositories");
            }

            HarvestProgress::RepoSkipped { org, repo } => {
                tracing::info!(repo = %format!("{org}/{repo}"), "Skipping repository");
            }

            HarvestProgress::RepoHarvested { org, repo } => {
                tracing::info!(repo = %format!("{org}/{repo}"), "Captured repository");
            }

            HarvestProgress::RepoFailed { org, repo, error } => {
                tracing::warn!(repo = %format!("{org}/{repo}"), error = %error, "Repository failed");
            }

            HarvestProgress::PageFetched {
                context,
                count,
                total_so_far,
            } => {
                tracing::debug!(context = %context, count, total_so_far, "Fetched page");
            }

            HarvestProgress::QueryError { context, message } => {
                tracing::warn!(context = %context, error = %message, "Query error");
            }

            HarvestProgress::RateLimitWait { context, seconds } => {
                tracing::info!(context = %context, seconds, "Waiting out rate limit");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
