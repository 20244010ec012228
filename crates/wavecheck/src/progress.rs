//! Progress reporting for harvest operations.
//!
//! A single typed event stream is shared by the paginator, the retry policy,
//! and the harvest engines, so the CLI can drive either a log-based or an
//! interactive reporter from one callback.

/// Progress events emitted while harvesting an organization.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum HarvestProgress {
    /// Starting to process an organization.
    OrgStarted {
        /// Organization login.
        org: String,
    },

    /// Repository enumeration finished for an organization.
    ReposEnumerated {
        /// Organization login.
        org: String,
        /// Number of repositories found.
        count: usize,
    },

    /// A repository was skipped because it already exists in the output
    /// (resume mode).
    RepoSkipped {
        /// Organization login.
        org: String,
        /// Repository name.
        repo: String,
    },

    /// A repository record was assembled and written.
    RepoHarvested {
        /// Organization login.
        org: String,
        /// Repository name.
        repo: String,
    },

    /// Assembling one repository failed; harvesting continues.
    RepoFailed {
        /// Organization login.
        org: String,
        /// Repository name.
        repo: String,
        /// Short error message.
        error: String,
    },

    /// Fetched one page of a paginated query.
    PageFetched {
        /// What is being paginated (query name or REST route).
        context: String,
        /// Items on this page.
        count: usize,
        /// Running total across pages.
        total_so_far: usize,
    },

    /// The remote returned query-level errors; pagination stops early.
    QueryError {
        /// What was being paginated.
        context: String,
        /// Error message as reported by the remote.
        message: String,
    },

    /// The retry policy is waiting out a rate limit.
    RateLimitWait {
        /// What triggered the wait (route or query name).
        context: String,
        /// Server-specified wait in seconds.
        seconds: u64,
    },
}

/// Callback used to report progress events.
pub type ProgressCallback = Box<dyn Fn(HarvestProgress) + Send + Sync>;

/// Emit an event if a callback is present.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: HarvestProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn emit_invokes_callback_when_present() {
        let events: Arc<Mutex<Vec<HarvestProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&events);
        let cb: ProgressCallback = Box::new(move |event| {
            capture.lock().unwrap_or_else(|e| e.into_inner()).push(event);
        });

        emit(Some(&cb), HarvestProgress::OrgStarted { org: "acme".into() });
        emit(
            None,
            HarvestProgress::OrgStarted {
                org: "ignored".into(),
            },
        );

        let events = events.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            HarvestProgress::OrgStarted { org } if org == "acme"
        ));
    }
}
