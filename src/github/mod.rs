// GitHub API module.
// Provides the cached client, pagination, and project queries for the GitHub REST API.

pub mod client;
pub mod endpoints;
pub mod pagination;
pub mod types;

pub use client::GitHubClient;
pub use endpoints::{GitHub, participation_ratio};
pub use pagination::{Link, Links, consume_pages};
pub use types::*;
