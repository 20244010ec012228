//! Wavecheck - inventory and reconciliation engine for wave-based
//! organization migrations.
//!
//! The library captures point-in-time inventories of organizations before
//! and after a migration run, extracts timing and incident facts from the
//! run's logs, and reconciles captures of the same key space to surface
//! exactly the fields that changed or went missing.
//!
//! # Example
//!
//! ```ignore
//! use wavecheck::github::GitHubClient;
//! use wavecheck::harvest::harvest_org;
//! use wavecheck::snapshot::{Phase, Side, SnapshotStore};
//!
//! let store = SnapshotStore::new("logs")?;
//! let output = store.stats_path(Phase::Before, Side::Source, 1);
//!
//! // One client per organization: each org sees its own rate-limit budget.
//! let client = GitHubClient::new(&token)?;
//! let summary = harvest_org(&client, &store, &output, Side::Source, "acme", false, None).await?;
//! println!("captured {} repositories", summary.written);
//! ```

pub mod github;
pub mod harvest;
pub mod http;
pub mod mannequin;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod retry;
pub mod snapshot;
pub mod timeline;
pub mod wave;

pub use github::{GitHubClient, GitHubError};
pub use harvest::{HarvestError, OrgHarvest, RepositoryRecord, harvest_org};
pub use progress::{HarvestProgress, ProgressCallback, emit};
pub use reconcile::{Discrepancy, ReconcileError, ReportKind, Table, compare_tables};
pub use report::{NamedTable, ReportSink, SinkError};
pub use retry::{RetryDecision, RetryPolicy};
pub use snapshot::{Entity, Phase, Side, SnapshotError, SnapshotStore};
pub use timeline::{Incident, OrgTiming, RepoTiming, Severity, TimelineError};
pub use wave::{OrgMapping, OrgPair, OrgRole, WaveError};
