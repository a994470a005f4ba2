// Project queries against the GitHub REST API.
// Each operation resolves to a value or fails as not found, server, or network error.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{Duration, SecondsFormat, Utc};
use futures::future::try_join_all;
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::{Result, ScavengerError};
use crate::packages::PackageRegistry;

use super::client::GitHubClient;
use super::pagination::Links;
use super::types::{Commit, FileInventory, FileKind, Repository, SearchResults};

/// Window of commit history considered for participation.
const PARTICIPATION_DAYS: i64 = 30;

/// Consumer-facing queries about projects and organizations.
pub struct GitHub {
    client: GitHubClient,
    packages: PackageRegistry,
}

impl GitHub {
    pub fn new(client: GitHubClient, packages: PackageRegistry) -> Self {
        Self { client, packages }
    }

    /// Client and package ecosystems configured from `config`.
    pub fn from_config(cache: Arc<ResponseCache>, config: &Config) -> Result<Self> {
        let client = GitHubClient::new(cache, config)?;
        let packages = PackageRegistry::with_defaults(client.clone(), &config.npm_api_url);
        Ok(Self::new(client, packages))
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    /// Core metadata for `owner/name`.
    pub async fn project(&self, owner: &str, name: &str) -> Result<Repository> {
        let response = self.client.get(&format!("/repos/{}/{}", owner, name)).await?;

        match response.status {
            200..=299 => Ok(serde_json::from_value(response.body)?),
            404 => Err(ScavengerError::NotFound(format!(
                "Project '{}/{}' not found.",
                owner, name
            ))),
            status => Err(ScavengerError::server(status, &response.body)),
        }
    }

    /// Repositories matching a free-text query.
    pub async fn find_projects(&self, query: &str) -> Result<Vec<Repository>> {
        let query: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let response = self
            .client
            .get(&format!("/search/repositories?q={}", query))
            .await?;

        if !response.is_success() {
            return Err(ScavengerError::server(response.status, &response.body));
        }

        let results: SearchResults = serde_json::from_value(response.body)?;
        Ok(results.items)
    }

    /// Repositories owned by an organization (first page).
    pub async fn organization(&self, name: &str) -> Result<Vec<Repository>> {
        let response = self.client.get(&format!("/orgs/{}/repos", name)).await?;

        match response.status {
            200..=299 => super::pagination::page_items(response.body),
            404 => Err(ScavengerError::NotFound(format!(
                "Organization '{}' does not exist.",
                name
            ))),
            status => Err(ScavengerError::server(status, &response.body)),
        }
    }

    /// Number of contributors, estimated from the first and last pages.
    ///
    /// Assumes every page but the last holds as many items as the first, so
    /// at most two requests are made however many pages there are.
    pub async fn contributor_count(&self, project: &Repository) -> Result<u64> {
        let endpoint = format!("/repos/{}/{}/contributors", project.owner.login, project.name);
        let first = self.client.get(&endpoint).await?;
        if !first.is_success() {
            return Err(ScavengerError::server(first.status, &first.body));
        }

        let per_page = first.item_count() as u64;
        let Some(last) = Links::from_response(&first).last else {
            return Ok(per_page);
        };

        let Some(last_page) = last.page else {
            debug!(url = %last.url, "Last page number missing, counting every page");
            let contributors: Vec<Value> = self.client.consume_pages(&endpoint).await?;
            return Ok(contributors.len() as u64);
        };

        let tail = self.client.get_url(&last.url).await?;
        if !tail.is_success() {
            return Err(ScavengerError::server(tail.status, &tail.body));
        }

        Ok(per_page * last_page.saturating_sub(1) + tail.item_count() as u64)
    }

    /// Share of the last 30 days of commits made by people outside the owning account.
    pub async fn participation(&self, project: &Repository) -> Result<f64> {
        let since = (Utc::now() - Duration::days(PARTICIPATION_DAYS))
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let since: String = form_urlencoded::byte_serialize(since.as_bytes()).collect();

        let commits: Vec<Commit> = self
            .client
            .consume_pages(&format!(
                "/repos/{}/{}/commits?since={}",
                project.owner.login, project.name, since
            ))
            .await?;

        let owner = project.owner.login.as_str();
        let authors: Vec<&str> = commits
            .iter()
            .filter_map(|commit| commit.author.as_ref())
            .map(|author| author.login.as_str())
            .filter(|login| *login != owner)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        // One lookup per distinct author
        let membership =
            try_join_all(authors.iter().map(|login| self.is_member(owner, login))).await?;
        let members: HashSet<&str> = authors
            .into_iter()
            .zip(membership)
            .filter_map(|(login, member)| member.then_some(login))
            .collect();

        let tallies: Vec<bool> = commits
            .iter()
            .map(|commit| match &commit.author {
                None => true,
                Some(author) => author.login != owner && !members.contains(author.login.as_str()),
            })
            .collect();

        Ok(participation_ratio(&tallies))
    }

    async fn is_member(&self, org: &str, login: &str) -> Result<bool> {
        let membership = self
            .client
            .get(&format!("/orgs/{}/members/{}", org, login))
            .await?;
        Ok(membership.status == 204)
    }

    /// Links to the README, contributing guide, and changelog at the repository root.
    pub async fn files(&self, project: &Repository) -> Result<FileInventory> {
        let contents = self
            .client
            .contents(&project.owner.login, &project.name)
            .await?;

        let mut files = FileInventory::new();
        for entry in &contents {
            let Some(url) = &entry.html_url else {
                continue;
            };
            for kind in FileKind::ALL {
                if kind.matches(&entry.path) {
                    files.entry(kind).or_insert_with(|| url.clone());
                }
            }
        }

        Ok(files)
    }

    /// Package downloads over the last 30 days, `None` when no ecosystem applies.
    pub async fn downloads(&self, project: &Repository) -> Result<Option<u64>> {
        self.packages.downloads(project).await
    }
}

/// Fraction of `true` (external) tallies, zero when there are none.
pub fn participation_ratio(external: &[bool]) -> f64 {
    if external.is_empty() {
        return 0.0;
    }
    let count = external.iter().filter(|&&e| e).count();
    count as f64 / external.len() as f64
}
