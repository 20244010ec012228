//! Per-organization repository harvesting.
//!
//! For one organization the engine enumerates repositories with the cursor
//! paginator, folds issue and pull-request aggregates across all pages, and
//! merges in the REST point lookups the graph query cannot provide. Each
//! assembled record is appended to the capture immediately so a killed run
//! loses at most the repository in flight.
//!
//! Sub-call failures are uniform: any GraphQL or REST failure while
//! assembling one repository becomes a typed entry in the returned
//! [`OrgHarvest`] and harvesting moves on to the next repository. The
//! orchestrator decides whether that is acceptable.

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::github::{GitHubClient, GitHubError, collect_nodes, page_variables, queries};
use crate::progress::{HarvestProgress, ProgressCallback, emit};
use crate::snapshot::{Side, SnapshotError, SnapshotStore};

use super::record::{
    IssueAggregates, IssueNode, PullAggregates, PullNode, RepoNode, RepositoryRecord, join_sorted,
};

/// Repositories per page when enumerating an organization.
const REPO_PAGE_SIZE: u32 = 10;

/// Issues/pull requests per page when folding aggregates.
const AGGREGATE_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("harvest of {org} failed: {source}")]
    Github {
        org: String,
        #[source]
        source: GitHubError,
    },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// A repository whose assembly failed; the rest of the organization
/// continued.
#[derive(Debug)]
pub struct RepoFailure {
    pub org: String,
    pub repo: String,
    pub error: GitHubError,
}

/// Summary of one organization's harvest.
#[derive(Debug, Default)]
pub struct OrgHarvest {
    pub org: String,
    /// Records appended to the capture.
    pub written: usize,
    /// Repositories skipped because they were already captured (resume).
    pub skipped: usize,
    /// Per-repository failures.
    pub failures: Vec<RepoFailure>,
}

/// Harvest every repository of `org` into the capture at `output`.
///
/// In resume mode, repository names already present in the capture's `name`
/// column are skipped without issuing any sub-query.
pub async fn harvest_org(
    client: &GitHubClient,
    store: &SnapshotStore,
    output: &Path,
    side: Side,
    org: &str,
    resume: bool,
    on_progress: Option<&ProgressCallback>,
) -> Result<OrgHarvest, HarvestError> {
    tracing::info!(org, side = %side, "processing organization");
    emit(
        on_progress,
        HarvestProgress::OrgStarted {
            org: org.to_string(),
        },
    );

    let existing = if resume {
        store.existing_values(output, "name")?
    } else {
        HashSet::new()
    };

    let nodes = collect_nodes(
        client,
        queries::ORG_REPOS,
        page_variables(&[("login", Value::from(org))], REPO_PAGE_SIZE),
        &["organization", "repositories"],
        on_progress,
    )
    .await
    .map_err(|source| HarvestError::Github {
        org: org.to_string(),
        source,
    })?;

    emit(
        on_progress,
        HarvestProgress::ReposEnumerated {
            org: org.to_string(),
            count: nodes.len(),
        },
    );

    let mut summary = OrgHarvest {
        org: org.to_string(),
        ..OrgHarvest::default()
    };

    for node in nodes {
        let repo: RepoNode = decode(queries::ORG_REPOS, node).map_err(|source| {
            HarvestError::Github {
                org: org.to_string(),
                source,
            }
        })?;

        if resume && existing.contains(&repo.name) {
            tracing::info!(org, repo = %repo.name, "skipping repository");
            emit(
                on_progress,
                HarvestProgress::RepoSkipped {
                    org: org.to_string(),
                    repo: repo.name.clone(),
                },
            );
            summary.skipped += 1;
            continue;
        }

        tracing::info!(org, repo = %repo.name, "processing repository");
        match assemble_record(client, side, &repo, on_progress).await {
            Ok(record) => {
                store.append(output, &record)?;
                summary.written += 1;
                emit(
                    on_progress,
                    HarvestProgress::RepoHarvested {
                        org: org.to_string(),
                        repo: repo.name.clone(),
                    },
                );
            }
            Err(error) => {
                tracing::warn!(org, repo = %repo.name, error = %error, "repository harvest failed");
                emit(
                    on_progress,
                    HarvestProgress::RepoFailed {
                        org: org.to_string(),
                        repo: repo.name.clone(),
                        error: error.short_message(),
                    },
                );
                summary.failures.push(RepoFailure {
                    org: org.to_string(),
                    repo: repo.name.clone(),
                    error,
                });
            }
        }
    }

    Ok(summary)
}

/// Assemble one repository's record: graph aggregates plus REST lookups.
async fn assemble_record(
    client: &GitHubClient,
    side: Side,
    node: &RepoNode,
    on_progress: Option<&ProgressCallback>,
) -> Result<RepositoryRecord, GitHubError> {
    let org = node.owner.login.as_str();
    let repo = node.name.as_str();

    let scoped = [
        ("owner", Value::from(org)),
        ("name", Value::from(repo)),
    ];

    let issue_nodes = collect_nodes(
        client,
        queries::ISSUES,
        page_variables(&scoped, AGGREGATE_PAGE_SIZE),
        &["repository", "issues"],
        on_progress,
    )
    .await?;
    let issues = IssueAggregates::fold(&decode_all::<IssueNode>(queries::ISSUES, issue_nodes)?);

    let pull_nodes = collect_nodes(
        client,
        queries::PULLS,
        page_variables(&scoped, AGGREGATE_PAGE_SIZE),
        &["repository", "pullRequests"],
        on_progress,
    )
    .await?;
    let pulls = PullAggregates::fold(&decode_all::<PullNode>(queries::PULLS, pull_nodes)?);

    let hooks_route = format!("/repos/{org}/{repo}/hooks");
    let hooks = client.rest_get(&hooks_route, on_progress).await?;
    let webhook_count = hooks.as_array().map(|a| a.len() as u64).unwrap_or(0);

    let workflows_route = format!("/repos/{org}/{repo}/actions/workflows");
    let workflows: WorkflowList = decode(
        &workflows_route,
        client.rest_get(&workflows_route, on_progress).await?,
    )?;

    let runs_route = format!("/repos/{org}/{repo}/actions/runs");
    let runs: WorkflowRunList =
        decode(&runs_route, client.rest_get(&runs_route, on_progress).await?)?;
    let last_workflow_run = if runs.total_count == 0 {
        None
    } else {
        runs.workflow_runs.first().map(|run| run.created_at.clone())
    };

    let branches_route = format!("/repos/{org}/{repo}/branches");
    let branches: Vec<NamedEntry> = decode(
        &branches_route,
        client.rest_get(&branches_route, on_progress).await?,
    )?;

    let teams_route = format!("/repos/{org}/{repo}/teams");
    let teams: Vec<NamedEntry> = decode(
        &teams_route,
        client.rest_get(&teams_route, on_progress).await?,
    )?;

    let environments_route = format!("/repos/{org}/{repo}/environments");
    let environments: EnvironmentList = decode(
        &environments_route,
        client.rest_get(&environments_route, on_progress).await?,
    )?;

    let detail_route = format!("/repos/{org}/{repo}");
    let detail: RepoDetail = decode(
        &detail_route,
        client.rest_get(&detail_route, on_progress).await?,
    )?;

    Ok(RepositoryRecord {
        name: node.name.clone(),
        owner_login: node.owner.login.clone(),
        url: node.url.clone(),
        disk_usage: node.disk_usage,
        is_archived: node.is_archived,
        is_locked: node.is_locked,
        visibility: detail.visibility,
        created_at: node.created_at,
        pushed_at: node.pushed_at,
        updated_at: node.updated_at,
        issue_count: node.issues.total_count,
        issue_comment_count: issues.comment_count,
        issue_timeline_item_count: issues.timeline_item_count,
        pull_request_count: node.pull_requests.total_count,
        pull_request_comment_count: pulls.comment_count,
        pull_request_commit_count: pulls.commit_count,
        pull_request_timeline_item_count: pulls.timeline_item_count,
        webhook_count,
        workflow_count: workflows.total_count,
        last_workflow_run,
        branches: join_sorted(branches.into_iter().map(|b| b.name).collect()),
        teams: join_sorted(teams.into_iter().map(|t| t.name).collect()),
        environments: environments.total_count,
        topics: join_sorted(detail.topics),
        permission_admin: detail.permissions.admin,
        permission_push: detail.permissions.push,
        permission_pull: detail.permissions.pull,
        source: side,
        inventoried: Utc::now(),
    })
}

fn decode<T: DeserializeOwned>(route: &str, value: Value) -> Result<T, GitHubError> {
    serde_json::from_value(value).map_err(|source| GitHubError::Decode {
        route: route.to_string(),
        source,
    })
}

fn decode_all<T: DeserializeOwned>(route: &str, values: Vec<Value>) -> Result<Vec<T>, GitHubError> {
    values
        .into_iter()
        .map(|value| decode(route, value))
        .collect()
}

// ---------- REST wire shapes ----------

#[derive(Debug, Deserialize)]
struct WorkflowList {
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunList {
    total_count: u64,
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct EnvironmentList {
    total_count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PermissionFlags {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    push: bool,
    #[serde(default)]
    pull: bool,
}

#[derive(Debug, Deserialize)]
struct RepoDetail {
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    permissions: PermissionFlags,
    #[serde(default)]
    visibility: String,
}
