//! Mannequin harvesting for user-mapping sheets.
//!
//! A dry-run migration leaves unclaimed mannequin identities on the target
//! side. This walks the organization's mannequins and merges each with a
//! profile point lookup, producing the rows operators fill in with target
//! usernames.

use serde::{Deserialize, Serialize};

use crate::github::{GitHubClient, GitHubError, collect_nodes, page_variables, queries};
use crate::progress::ProgressCallback;

/// Mannequins per page.
const MANNEQUIN_PAGE_SIZE: u32 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MannequinNode {
    login: String,
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UserProfile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// One row of the user-mapping sheet. `target-user` is left blank for the
/// operator to fill in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MannequinRecord {
    #[serde(rename = "mannequin-user")]
    pub login: String,
    #[serde(rename = "mannequin-id")]
    pub id: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "target-user")]
    pub target_user: String,
    pub target_org: String,
}

/// Result of one organization's mannequin harvest.
#[derive(Debug, Default)]
pub struct MannequinHarvest {
    pub records: Vec<MannequinRecord>,
    /// Mannequins whose profile merge failed, with the failure.
    pub failures: Vec<(String, GitHubError)>,
}

/// Harvest the mannequins of a (dry-run) target organization.
pub async fn harvest_mannequins(
    client: &GitHubClient,
    org: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<MannequinHarvest, GitHubError> {
    let nodes = collect_nodes(
        client,
        queries::ORG_MANNEQUINS,
        page_variables(&[("login", org.into())], MANNEQUIN_PAGE_SIZE),
        &["organization", "mannequins"],
        on_progress,
    )
    .await?;

    let mut harvest = MannequinHarvest::default();

    for node in nodes {
        let mannequin: MannequinNode =
            serde_json::from_value(node).map_err(|source| GitHubError::Decode {
                route: queries::ORG_MANNEQUINS.to_string(),
                source,
            })?;

        let route = format!("/users/{}", mannequin.login);
        let profile: UserProfile = match client.rest_get(&route, on_progress).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(error) => {
                tracing::warn!(org, mannequin = %mannequin.login, error = %error, "profile lookup failed");
                harvest.failures.push((mannequin.login.clone(), error));
                continue;
            }
        };

        harvest.records.push(MannequinRecord {
            login: mannequin.login,
            id: mannequin.id,
            name: profile.name,
            company: profile.company,
            email: mannequin.email.or(profile.email),
            target_user: String::new(),
            target_org: org.to_string(),
        });
    }

    Ok(harvest)
}
