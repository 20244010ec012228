//! Repository harvesting: typed records and the per-org engine.

mod engine;
mod record;

pub use engine::{HarvestError, OrgHarvest, RepoFailure, harvest_org};
pub use record::{
    IssueAggregates, IssueNode, OwnerNode, PullAggregates, PullNode, RepoNode, RepositoryRecord,
    TotalCount, join_sorted,
};
