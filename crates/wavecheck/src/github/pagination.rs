//! Cursor pagination over GraphQL queries.
//!
//! The paginator walks a named query template to completion: the variable
//! map carries a `pageSize` and an `endCursor` (initially null), and each
//! response exposes a `pageInfo { hasNextPage endCursor }` pair at a
//! caller-supplied path under `data`. Nodes are collected in page order.
//!
//! Query-level errors are a soft fail: each message is logged and the walk
//! stops early, returning whatever was already collected, so one broken
//! query does not abort an entire organization's harvest.

use serde_json::{Map, Value};

use crate::progress::{HarvestProgress, ProgressCallback, emit};

use super::client::GitHubClient;
use super::error::GitHubError;
use super::queries;

/// Build the variable map for a cursor-paginated query.
///
/// `endCursor` starts null; the paginator advances it between pages.
#[must_use]
pub fn page_variables(extra: &[(&str, Value)], page_size: u32) -> Map<String, Value> {
    let mut variables = Map::new();
    for (key, value) in extra {
        variables.insert((*key).to_string(), value.clone());
    }
    variables.insert("pageSize".to_string(), Value::from(page_size));
    variables.insert("endCursor".to_string(), Value::Null);
    variables
}

/// Walk every page of `query_name` and collect the nodes at `page_path`.
///
/// `page_path` addresses the paginated collection under the response's
/// `data` object (e.g. `["organization", "repositories"]`).
pub async fn collect_nodes(
    client: &GitHubClient,
    query_name: &str,
    mut variables: Map<String, Value>,
    page_path: &[&str],
    on_progress: Option<&ProgressCallback>,
) -> Result<Vec<Value>, GitHubError> {
    let template = queries::template(query_name)
        .ok_or_else(|| GitHubError::UnknownQuery(query_name.to_string()))?;

    let mut items: Vec<Value> = Vec::new();

    loop {
        let response = client
            .graphql(template, Value::Object(variables.clone()), on_progress)
            .await?;

        // Query-level errors terminate the walk without retracting what was
        // already yielded.
        if let Some(errors) = response.get("errors").and_then(Value::as_array)
            && !errors.is_empty()
        {
            for error in errors {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                tracing::warn!(query = query_name, error = message, "query error");
                emit(
                    on_progress,
                    HarvestProgress::QueryError {
                        context: query_name.to_string(),
                        message: message.to_string(),
                    },
                );
            }
            return Ok(items);
        }

        let collection = walk(&response, page_path).ok_or_else(|| GitHubError::MissingData {
            route: query_name.to_string(),
            path: page_path.join("."),
        })?;

        let nodes = collection
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| GitHubError::MissingData {
                route: query_name.to_string(),
                path: format!("{}.nodes", page_path.join(".")),
            })?;
        items.extend(nodes.iter().cloned());

        emit(
            on_progress,
            HarvestProgress::PageFetched {
                context: query_name.to_string(),
                count: nodes.len(),
                total_so_far: items.len(),
            },
        );

        let page_info = collection
            .get("pageInfo")
            .ok_or_else(|| GitHubError::MissingData {
                route: query_name.to_string(),
                path: format!("{}.pageInfo", page_path.join(".")),
            })?;

        if !page_info
            .get("hasNextPage")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return Ok(items);
        }

        variables.insert(
            "endCursor".to_string(),
            page_info.get("endCursor").cloned().unwrap_or(Value::Null),
        );
    }
}

/// Navigate `data.<path...>` in a GraphQL response.
fn walk<'a>(response: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = response.get("data")?;
    for level in path {
        current = current.get(level)?;
    }
    Some(current)
}
