//! The normalized per-repository capture row.
//!
//! The record is a flat, typed shape whose serde names are the dotted leaf
//! paths downstream reconciliation addresses columns by. Pagination
//! bookkeeping never enters the record: aggregates are folded while paging
//! and only the folded totals are kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::Side;

/// One row per repository per (phase, side) capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    #[serde(rename = "owner.login")]
    pub owner_login: String,
    pub url: String,
    #[serde(rename = "diskUsage")]
    pub disk_usage: i64,
    #[serde(rename = "isArchived")]
    pub is_archived: bool,
    #[serde(rename = "isLocked")]
    pub is_locked: bool,
    pub visibility: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "pushedAt")]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(rename = "issues.totalCount")]
    pub issue_count: u64,
    #[serde(rename = "issues.comments.totalCount")]
    pub issue_comment_count: u64,
    #[serde(rename = "issues.timelineItems.totalCount")]
    pub issue_timeline_item_count: u64,

    #[serde(rename = "pullRequests.totalCount")]
    pub pull_request_count: u64,
    #[serde(rename = "pullRequests.comments.totalCount")]
    pub pull_request_comment_count: u64,
    #[serde(rename = "pullRequests.commits.totalCount")]
    pub pull_request_commit_count: u64,
    #[serde(rename = "pullRequests.timelineItems.totalCount")]
    pub pull_request_timeline_item_count: u64,

    #[serde(rename = "webhooks.totalCount")]
    pub webhook_count: u64,
    #[serde(rename = "workflows.totalCount")]
    pub workflow_count: u64,
    #[serde(rename = "lastWorkflowRun")]
    pub last_workflow_run: Option<String>,
    /// Sorted branch names, `;`-joined.
    pub branches: String,
    /// Sorted team names, `;`-joined.
    pub teams: String,
    pub environments: u64,
    /// Sorted topics, `;`-joined.
    pub topics: String,
    #[serde(rename = "permissions.admin")]
    pub permission_admin: bool,
    #[serde(rename = "permissions.push")]
    pub permission_push: bool,
    #[serde(rename = "permissions.pull")]
    pub permission_pull: bool,

    /// Which side produced this capture.
    #[serde(rename = "Source")]
    pub source: Side,
    /// When this row was captured.
    #[serde(rename = "Inventoried")]
    pub inventoried: DateTime<Utc>,
}

/// Sort a list and join it into one CSV cell.
#[must_use]
pub fn join_sorted(mut items: Vec<String>) -> String {
    items.sort();
    items.join(";")
}

// ---------- GraphQL wire shapes ----------

/// A `totalCount` wrapper as GraphQL returns it.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerNode {
    pub login: String,
}

/// One repository as enumerated by the `org-repos` query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoNode {
    pub name: String,
    pub owner: OwnerNode,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub disk_usage: i64,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_locked: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub issues: TotalCount,
    #[serde(default)]
    pub pull_requests: TotalCount,
}

/// One issue as paged by the `issues` query.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueNode {
    #[serde(default)]
    pub comments: TotalCount,
    #[serde(default)]
    pub timeline_items: TotalCount,
}

/// One pull request as paged by the `pulls` query.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullNode {
    #[serde(default)]
    pub comments: TotalCount,
    #[serde(default)]
    pub commits: TotalCount,
    #[serde(default)]
    pub timeline_items: TotalCount,
}

/// Folded issue aggregates for one repository.
///
/// An empty page set folds to all-zero counters, so the capture always has
/// every aggregate column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueAggregates {
    pub comment_count: u64,
    pub timeline_item_count: u64,
}

impl IssueAggregates {
    #[must_use]
    pub fn fold(nodes: &[IssueNode]) -> Self {
        nodes.iter().fold(Self::default(), |acc, node| Self {
            comment_count: acc.comment_count + node.comments.total_count,
            timeline_item_count: acc.timeline_item_count + node.timeline_items.total_count,
        })
    }
}

/// Folded pull-request aggregates for one repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullAggregates {
    pub comment_count: u64,
    pub commit_count: u64,
    pub timeline_item_count: u64,
}

impl PullAggregates {
    #[must_use]
    pub fn fold(nodes: &[PullNode]) -> Self {
        nodes.iter().fold(Self::default(), |acc, node| Self {
            comment_count: acc.comment_count + node.comments.total_count,
            commit_count: acc.commit_count + node.commits.total_count,
            timeline_item_count: acc.timeline_item_count + node.timeline_items.total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_sorted_orders_and_joins() {
        assert_eq!(
            join_sorted(vec!["main".into(), "dev".into(), "release".into()]),
            "dev;main;release"
        );
        assert_eq!(join_sorted(Vec::new()), "");
    }

    #[test]
    fn issue_aggregates_fold_to_zero_on_empty_input() {
        assert_eq!(IssueAggregates::fold(&[]), IssueAggregates::default());
        assert_eq!(PullAggregates::fold(&[]), PullAggregates::default());
    }

    #[test]
    fn aggregates_sum_across_nodes() {
        let nodes = vec![
            IssueNode {
                comments: TotalCount { total_count: 2 },
                timeline_items: TotalCount { total_count: 5 },
            },
            IssueNode {
                comments: TotalCount { total_count: 3 },
                timeline_items: TotalCount { total_count: 1 },
            },
        ];
        let folded = IssueAggregates::fold(&nodes);
        assert_eq!(folded.comment_count, 5);
        assert_eq!(folded.timeline_item_count, 6);
    }

    #[test]
    fn repo_node_deserializes_from_graphql_shape() {
        let node: RepoNode = serde_json::from_value(serde_json::json!({
            "name": "api",
            "owner": {"login": "acme"},
            "url": "https://github.com/acme/api",
            "diskUsage": 2048,
            "isArchived": false,
            "isLocked": false,
            "createdAt": "2023-01-01T00:00:00Z",
            "pushedAt": null,
            "updatedAt": "2024-03-01T12:00:00Z",
            "issues": {"totalCount": 12},
            "pullRequests": {"totalCount": 7}
        }))
        .expect("node should deserialize");

        assert_eq!(node.name, "api");
        assert_eq!(node.owner.login, "acme");
        assert_eq!(node.issues.total_count, 12);
        assert_eq!(node.pull_requests.total_count, 7);
        assert!(node.pushed_at.is_none());
    }

    #[test]
    fn record_columns_round_trip_through_csv() {
        let record = RepositoryRecord {
            name: "api".into(),
            owner_login: "acme".into(),
            url: "https://github.com/acme/api".into(),
            disk_usage: 2048,
            is_archived: false,
            is_locked: false,
            visibility: "private".into(),
            created_at: None,
            pushed_at: None,
            updated_at: None,
            issue_count: 12,
            issue_comment_count: 30,
            issue_timeline_item_count: 44,
            pull_request_count: 7,
            pull_request_comment_count: 9,
            pull_request_commit_count: 21,
            pull_request_timeline_item_count: 13,
            webhook_count: 1,
            workflow_count: 2,
            last_workflow_run: Some("2024-04-01T00:00:00Z".into()),
            branches: "dev;main".into(),
            teams: "platform".into(),
            environments: 1,
            topics: "internal".into(),
            permission_admin: true,
            permission_push: true,
            permission_pull: true,
            source: Side::Source,
            inventoried: "2024-04-12T00:00:00Z".parse().expect("timestamp"),
        };

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&record).expect("serialize");
        let bytes = writer.into_inner().expect("into inner");
        let text = String::from_utf8(bytes).expect("utf8");

        let header = text.lines().next().expect("header line");
        for column in [
            "owner.login",
            "issues.comments.totalCount",
            "pullRequests.commits.totalCount",
            "webhooks.totalCount",
            "permissions.admin",
            "Source",
            "Inventoried",
        ] {
            assert!(header.contains(column), "header should contain {column}");
        }

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let parsed: RepositoryRecord = reader
            .deserialize()
            .next()
            .expect("one row")
            .expect("deserialize");
        assert_eq!(parsed, record);
    }
}
