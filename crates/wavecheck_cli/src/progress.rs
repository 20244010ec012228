//! Progress reporting for harvest operations.
//!
//! Two modes:
//! - Interactive mode (TTY): animated per-org spinners using indicatif
//! - Logging mode (non-TTY): structured logging using tracing

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use wavecheck::{HarvestProgress, ProgressCallback};

pub use interactive::InteractiveReporter;
pub use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Interactive progress bars for TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (CI, pipes).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stderr().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: HarvestProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Wrap the reporter as the callback the engine expects.
    pub fn into_callback(self) -> ProgressCallback {
        let reporter = Arc::new(self);
        Box::new(move |event| reporter.handle(event))
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
