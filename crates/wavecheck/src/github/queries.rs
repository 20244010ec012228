//! GraphQL query templates.
//!
//! Templates are static text embedded at compile time and resolved by name
//! through a registry built once per process. Callers address queries by
//! name so harvesting code reads like the query plan it executes.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Enumerate an organization's repositories with their scalar metadata and
/// issue/PR totals.
pub const ORG_REPOS: &str = "org-repos";

/// Per-repository issue aggregates (comments, timeline items).
pub const ISSUES: &str = "issues";

/// Per-repository pull-request aggregates (comments, commits, timeline items).
pub const PULLS: &str = "pulls";

/// An organization's unclaimed mannequin identities.
pub const ORG_MANNEQUINS: &str = "org-mannequins";

static REGISTRY: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        (ORG_REPOS, include_str!("graphql/org-repos.graphql")),
        (ISSUES, include_str!("graphql/issues.graphql")),
        (PULLS, include_str!("graphql/pulls.graphql")),
        (ORG_MANNEQUINS, include_str!("graphql/org-mannequins.graphql")),
    ])
});

/// Look up a query template by name.
#[must_use]
pub fn template(name: &str) -> Option<&'static str> {
    REGISTRY.get(name).copied()
}
