//! GitHub API access: client, query templates, and cursor pagination.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for GitHub API operations
//! - [`client`] - Token-scoped client over the GraphQL and REST surfaces
//! - [`queries`] - Named GraphQL query templates
//! - [`pagination`] - Cursor pagination over GraphQL queries

mod client;
mod error;
pub mod pagination;
pub mod queries;

pub use client::{GitHubClient, LinkPagination, parse_link_header, rate_limit_error};
pub use error::GitHubError;
pub use pagination::{collect_nodes, page_variables};
