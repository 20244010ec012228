//! GitHub API client: a token-scoped view over both API surfaces.
//!
//! The client is created by an explicit factory from a credential and owns no
//! global state; the orchestrator builds one client per organization so each
//! organization's harvest sees its own rate-limit budget. Every remote call is
//! routed through the [`RetryPolicy`](crate::retry::RetryPolicy); nothing
//! else in the crate sleeps or retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::http::{
    HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport,
    header_get,
};
use crate::progress::{HarvestProgress, ProgressCallback, emit};
use crate::retry::RetryPolicy;

use super::error::GitHubError;

/// Items requested per REST page.
const PER_PAGE: usize = 100;

/// Fallback wait when the server flags a primary limit without a usable
/// reset time.
const DEFAULT_PRIMARY_WAIT: Duration = Duration::from_secs(60);

/// Pagination information extracted from GitHub's `Link` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPagination {
    /// The last page number (from rel="last").
    pub last_page: Option<u32>,
    /// The next page number (from rel="next").
    pub next_page: Option<u32>,
}

/// Parse a `Link` header to extract pagination info.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/organizations/123/repos?per_page=100&page=2>; rel="next", <...&page=3>; rel="last"`
#[must_use]
pub fn parse_link_header(link_header: &str) -> LinkPagination {
    let mut info = LinkPagination::default();

    for part in link_header.split(',') {
        let part = part.trim();

        let mut url = None;
        let mut rel = None;

        for segment in part.split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(rel_value) = segment.strip_prefix("rel=") {
                rel = Some(rel_value.trim_matches('"'));
            }
        }

        if let (Some(url), Some(rel_type)) = (url, rel)
            && let Some(page_num) = extract_page_from_url(url)
        {
            match rel_type {
                "last" => info.last_page = Some(page_num),
                "next" => info.next_page = Some(page_num),
                _ => {}
            }
        }
    }

    info
}

/// Extract the `page` parameter from a URL.
fn extract_page_from_url(url: &str) -> Option<u32> {
    let query_start = url.find('?')?;
    let query = &url[query_start + 1..];

    for param in query.split('&') {
        if let Some(value) = param.strip_prefix("page=") {
            return value.parse().ok();
        }
    }

    None
}

/// Map a throttling response to a typed rate-limit error.
///
/// A 403/429 with `x-ratelimit-remaining: 0` is the primary (quota) limit;
/// the wait comes from `retry-after` when present, otherwise from the
/// `x-ratelimit-reset` epoch. A 403/429 with only `retry-after` is the
/// secondary (abuse-detection) limit. Anything else is not a rate limit.
#[must_use]
pub fn rate_limit_error(status: u16, headers: &HttpHeaders) -> Option<GitHubError> {
    if status != 403 && status != 429 {
        return None;
    }

    let retry_after = header_get(headers, "retry-after")
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);

    if header_get(headers, "x-ratelimit-remaining") == Some("0") {
        let until_reset = header_get(headers, "x-ratelimit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .map(|epoch| Duration::from_secs(epoch.saturating_sub(Utc::now().timestamp()).max(0) as u64));
        return Some(GitHubError::PrimaryRateLimit {
            retry_after: retry_after.or(until_reset).unwrap_or(DEFAULT_PRIMARY_WAIT),
        });
    }

    retry_after.map(|retry_after| GitHubError::SecondaryRateLimit { retry_after })
}

/// A token-scoped GitHub API client.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    token: String,
    api_base: String,
    graphql_url: String,
    policy: RetryPolicy,
}

impl GitHubClient {
    /// Create a client for api.github.com from a personal access token.
    pub fn new(token: &str) -> Result<Self, GitHubError> {
        let transport = ReqwestTransport::with_timeout(Duration::from_secs(30))?;
        Ok(Self::with_transport(
            token,
            "https://api.github.com",
            Arc::new(transport),
        ))
    }

    /// Create a client against an arbitrary base URL and transport.
    ///
    /// This is the seam unit tests use with a mock transport; it is also how
    /// GitHub Enterprise Server endpoints would be addressed.
    pub fn with_transport(
        token: &str,
        api_base: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let api_base = api_base.trim_end_matches('/').to_string();
        let graphql_url = format!("{api_base}/graphql");
        Self {
            transport,
            token: token.to_string(),
            api_base,
            graphql_url,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy (tests and non-default budgets).
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn request_headers(&self) -> HttpHeaders {
        vec![
            ("authorization".to_string(), format!("Bearer {}", self.token)),
            (
                "accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
            ("user-agent".to_string(), "wavecheck".to_string()),
        ]
    }

    async fn send_once(
        &self,
        method: HttpMethod,
        url: &str,
        body: Vec<u8>,
        route_label: &str,
    ) -> Result<HttpResponse, GitHubError> {
        let response = self
            .transport
            .send(HttpRequest {
                method,
                url: url.to_string(),
                headers: self.request_headers(),
                body,
            })
            .await?;

        if (200..300).contains(&response.status) {
            return Ok(response);
        }

        if let Some(err) = rate_limit_error(response.status, &response.headers) {
            return Err(err);
        }

        Err(GitHubError::Status {
            status: response.status,
            route: route_label.to_string(),
        })
    }

    /// Execute a GraphQL query and return the raw response document
    /// (`data` and, when present, `errors`).
    pub async fn graphql(
        &self,
        query: &str,
        variables: Value,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Value, GitHubError> {
        let payload = serde_json::json!({
            "query": query,
            "variables": variables,
        })
        .to_string()
        .into_bytes();

        let response = self
            .policy
            .run("graphql", on_progress, || {
                self.send_once(
                    HttpMethod::Post,
                    &self.graphql_url,
                    payload.clone(),
                    "graphql",
                )
            })
            .await?;

        serde_json::from_slice(&response.body).map_err(|e| GitHubError::Decode {
            route: "graphql".to_string(),
            source: e,
        })
    }

    /// GET a REST route (e.g. `/repos/acme/api/branches`) and decode the
    /// JSON body.
    pub async fn rest_get(
        &self,
        route: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Value, GitHubError> {
        let (value, _) = self.rest_get_with_headers(route, on_progress).await?;
        Ok(value)
    }

    async fn rest_get_with_headers(
        &self,
        route: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<(Value, HttpHeaders), GitHubError> {
        let url = format!("{}{}", self.api_base, route);
        let response = self
            .policy
            .run(route, on_progress, || {
                self.send_once(HttpMethod::Get, &url, Vec::new(), route)
            })
            .await?;

        let value = serde_json::from_slice(&response.body).map_err(|e| GitHubError::Decode {
            route: route.to_string(),
            source: e,
        })?;
        Ok((value, response.headers))
    }

    /// GET every page of a list route, following the `Link` header until the
    /// last page, and return the concatenated items.
    pub async fn rest_get_paged(
        &self,
        route: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<Value>, GitHubError> {
        let mut items: Vec<Value> = Vec::new();
        let mut page = 1u32;

        loop {
            let sep = if route.contains('?') { '&' } else { '?' };
            let paged_route = format!("{route}{sep}per_page={PER_PAGE}&page={page}");
            let (value, headers) = self.rest_get_with_headers(&paged_route, on_progress).await?;

            let batch = value.as_array().cloned().ok_or_else(|| GitHubError::MissingData {
                route: paged_route.clone(),
                path: "top-level array".to_string(),
            })?;
            let count = batch.len();
            items.extend(batch);

            emit(
                on_progress,
                HarvestProgress::PageFetched {
                    context: route.to_string(),
                    count,
                    total_so_far: items.len(),
                },
            );

            let link = header_get(&headers, "link")
                .map(parse_link_header)
                .unwrap_or_default();

            match link.next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(items)
    }
}
