// npm ecosystem.
// Detects a root package.json and reads last-month downloads from the npm API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, ScavengerError};
use crate::github::{ContentEntry, GitHubClient, Repository};

use super::PackageManager;

const MANIFEST: &str = "package.json";

#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DownloadPoint {
    downloads: u64,
}

/// Projects with a `package.json` at the repository root.
pub struct Npm {
    client: GitHubClient,
    api_url: String,
}

impl Npm {
    pub fn new(client: GitHubClient, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn manifest_entry(&self, project: &Repository) -> Result<Option<ContentEntry>> {
        let contents = self
            .client
            .contents(&project.owner.login, &project.name)
            .await?;
        Ok(contents.into_iter().find(|entry| entry.path == MANIFEST))
    }

    /// Package name declared by the manifest, which may differ from the repository name.
    async fn package_name(&self, project: &Repository) -> Result<String> {
        let download_url = self
            .manifest_entry(project)
            .await?
            .and_then(|entry| entry.download_url)
            .ok_or_else(|| {
                ScavengerError::NotFound(format!(
                    "Project '{}/{}' has no {}.",
                    project.owner.login, project.name, MANIFEST
                ))
            })?;

        let response = self.client.get_public(&download_url).await?;
        if !response.is_success() {
            return Err(ScavengerError::server(response.status, &response.body));
        }

        // Raw file hosts may serve the manifest as text
        let manifest: Manifest = match response.body {
            Value::String(text) => serde_json::from_str(&text)?,
            body => serde_json::from_value(body)?,
        };
        Ok(manifest.name)
    }
}

#[async_trait]
impl PackageManager for Npm {
    fn name(&self) -> &'static str {
        "npm"
    }

    async fn matches(&self, project: &Repository) -> Result<bool> {
        Ok(self.manifest_entry(project).await?.is_some())
    }

    async fn downloads(&self, project: &Repository) -> Result<u64> {
        let package = self.package_name(project).await?;
        let url = format!("{}/downloads/point/last-month/{}", self.api_url, package);

        let response = self.client.get_public(&url).await?;
        if !response.is_success() {
            return Err(ScavengerError::server(response.status, &response.body));
        }

        let point: DownloadPoint = serde_json::from_value(response.body)?;
        Ok(point.downloads)
    }
}
