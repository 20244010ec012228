//! Entity snapshot harvesting.
//!
//! Captures an organization's users, repositories, teams, and per-team
//! memberships through the paged REST surface, one CSV per
//! (phase, side, org, entity). Rows are typed; anything the types do not
//! name (notably the `*_url` noise) is never captured.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::github::{GitHubClient, GitHubError};
use crate::progress::ProgressCallback;

use super::{Entity, Phase, Side, SnapshotError, SnapshotStore};

#[derive(Debug, Error)]
pub enum EntitySnapshotError {
    #[error("snapshot of {org} failed: {source}")]
    Github {
        org: String,
        #[source]
        source: GitHubError,
    },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// An organization member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub login: String,
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub site_admin: bool,
}

/// A repository as listed by the org repos endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgRepoRow {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub default_branch: String,
    #[serde(default)]
    pub visibility: String,
}

/// A team in the organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRow {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub privacy: String,
    #[serde(default)]
    pub permission: String,
}

/// A repository a team has access to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRepoRow {
    pub team_slug: String,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
}

/// A team member with their resolved role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamUserRow {
    pub team_slug: String,
    pub role: String,
    pub login: String,
    pub org: String,
}

#[derive(Debug, Deserialize)]
struct Membership {
    role: String,
}

/// Row counts of one organization's entity captures.
#[derive(Debug, Default)]
pub struct EntitySnapshot {
    pub org: String,
    pub users: usize,
    pub repos: usize,
    pub teams: usize,
    pub team_repos: usize,
    pub team_users: usize,
}

/// Capture all five entity types for one organization.
///
/// A team with no members yet (common right after a migration) produces an
/// empty but valid `team-users` capture.
pub async fn snapshot_org(
    client: &GitHubClient,
    store: &SnapshotStore,
    phase: Phase,
    side: Side,
    org: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<EntitySnapshot, EntitySnapshotError> {
    tracing::info!(org, phase = %phase, side = %side, "generating snapshots");

    let users: Vec<UserRow> =
        fetch_rows(client, org, &format!("/orgs/{org}/members"), on_progress).await?;
    write_capture(store, phase, side, org, Entity::Users, &users)?;

    let repos: Vec<OrgRepoRow> =
        fetch_rows(client, org, &format!("/orgs/{org}/repos"), on_progress).await?;
    write_capture(store, phase, side, org, Entity::Repos, &repos)?;

    let teams: Vec<TeamRow> =
        fetch_rows(client, org, &format!("/orgs/{org}/teams"), on_progress).await?;
    write_capture(store, phase, side, org, Entity::Teams, &teams)?;

    let mut team_repos: Vec<TeamRepoRow> = Vec::new();
    let mut team_users: Vec<TeamUserRow> = Vec::new();

    for team in &teams {
        let slug = team.slug.as_str();

        let repos: Vec<OrgRepoRow> = fetch_rows(
            client,
            org,
            &format!("/orgs/{org}/teams/{slug}/repos"),
            on_progress,
        )
        .await?;
        team_repos.extend(repos.into_iter().map(|repo| TeamRepoRow {
            team_slug: slug.to_string(),
            name: repo.name,
            full_name: repo.full_name,
            private: repo.private,
        }));

        let members: Vec<UserRow> = fetch_rows(
            client,
            org,
            &format!("/orgs/{org}/teams/{slug}/members"),
            on_progress,
        )
        .await?;
        for member in members {
            let route = format!("/orgs/{org}/teams/{slug}/memberships/{}", member.login);
            let membership: Membership = client
                .rest_get(&route, on_progress)
                .await
                .and_then(|value| {
                    serde_json::from_value(value).map_err(|source| GitHubError::Decode {
                        route: route.clone(),
                        source,
                    })
                })
                .map_err(|source| EntitySnapshotError::Github {
                    org: org.to_string(),
                    source,
                })?;
            team_users.push(TeamUserRow {
                team_slug: slug.to_string(),
                role: membership.role,
                login: member.login,
                org: org.to_string(),
            });
        }
    }

    write_capture(store, phase, side, org, Entity::TeamRepos, &team_repos)?;
    write_capture(store, phase, side, org, Entity::TeamUsers, &team_users)?;

    Ok(EntitySnapshot {
        org: org.to_string(),
        users: users.len(),
        repos: repos.len(),
        teams: teams.len(),
        team_repos: team_repos.len(),
        team_users: team_users.len(),
    })
}

async fn fetch_rows<T: DeserializeOwned>(
    client: &GitHubClient,
    org: &str,
    route: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<Vec<T>, EntitySnapshotError> {
    let values = client
        .rest_get_paged(route, on_progress)
        .await
        .map_err(|source| EntitySnapshotError::Github {
            org: org.to_string(),
            source,
        })?;
    values
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).map_err(|source| EntitySnapshotError::Github {
                org: org.to_string(),
                source: GitHubError::Decode {
                    route: route.to_string(),
                    source,
                },
            })
        })
        .collect()
}

fn write_capture<T: Serialize>(
    store: &SnapshotStore,
    phase: Phase,
    side: Side,
    org: &str,
    entity: Entity,
    rows: &[T],
) -> Result<(), SnapshotError> {
    let path = store.entity_path(phase, side, org, entity);
    store.reset(&path)?;
    store.touch(&path)?;
    store.append_all(&path, rows)
}
