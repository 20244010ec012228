use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use wavecheck::HarvestProgress;

/// Per-organization progress state.
#[derive(Default)]
struct ProgressState {
    /// Spinner for the organization currently being harvested.
    bar: Option<ProgressBar>,
    #[allow(dead_code)]
    processed: usize,
    #[allow(dead_code)]
    failed: usize,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    fn spinner(&self, org: &str) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::with_template("{spinner} {prefix} {msg} ({pos} repos)")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(org.to_string());
        bar
    }

    pub fn handle(&self, event: HarvestProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            HarvestProgress::OrgStarted { org } => {
                if let Some(bar) = state.bar.take() {
                    bar.finish();
                }
                state.processed = 0;
                state.failed = 0;
                state.bar = Some(self.spinner(&org));
            }

            HarvestProgress::ReposEnumerated { count, .. } => {
                if let Some(bar) = &state.bar {
                    bar.set_length(count as u64);
                    bar.set_message("harvesting");
                }
            }

            HarvestProgress::RepoHarvested { repo, .. }
            | HarvestProgress::RepoSkipped { repo, .. } => {
                state.processed += 1;
                if let Some(bar) = &state.bar {
                    bar.inc(1);
                    bar.set_message(repo);
                }
            }

            HarvestProgress::RepoFailed { repo, .. } => {
                state.processed += 1;
                state.failed += 1;
                if let Some(bar) = &state.bar {
                    bar.inc(1);
                    bar.set_message(format!("{repo} failed"));
                }
            }

            HarvestProgress::RateLimitWait { seconds, .. } => {
                if let Some(bar) = &state.bar {
                    bar.set_message(format!("rate limited, waiting {seconds}s"));
                }
            }

            HarvestProgress::QueryError { message, .. } => {
                if let Some(bar) = &state.bar {
                    bar.set_message(format!("query error: {message}"));
                }
            }

            _ => {}
        }
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}
