// Project view aggregation.
// Fetches core metadata, then fans out to the four derived statistics and joins them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::{ViewBuilder, ViewStatus};
use crate::error::Result;
use crate::github::{FileInventory, GitHub, Repository};

/// Consolidated view of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectView {
    pub description: String,
    pub language: String,
    pub owner: String,
    pub name: String,
    pub fork_count: u64,
    pub star_count: u64,
    pub watcher_count: u64,
    pub contributor_count: u64,
    pub participation_ratio: f64,
    pub files: FileInventory,
    /// Last-month package downloads; `None` when no ecosystem applies.
    pub download_count: Option<u64>,
}

impl ProjectView {
    fn assemble(
        project: Repository,
        contributor_count: u64,
        participation_ratio: f64,
        files: FileInventory,
        download_count: Option<u64>,
    ) -> Self {
        Self {
            description: project.description.unwrap_or_default(),
            language: project.language.unwrap_or_else(|| "unknown".to_string()),
            owner: project.owner.login,
            name: project.name,
            fork_count: project.forks_count,
            star_count: project.stargazers_count,
            watcher_count: project.watchers_count,
            contributor_count,
            participation_ratio,
            files,
            download_count,
        }
    }
}

/// Builds [`ProjectView`]s from GitHub and package registry data.
#[derive(Clone)]
pub struct Aggregator {
    github: Arc<GitHub>,
}

impl Aggregator {
    pub fn new(github: Arc<GitHub>) -> Self {
        Self { github }
    }

    pub fn github(&self) -> &Arc<GitHub> {
        &self.github
    }

    /// View cache key for a project.
    pub fn view_path(owner: &str, name: &str) -> String {
        format!("/{}/{}", owner, name)
    }

    /// Build the full view for `owner/name`.
    ///
    /// The four statistics are computed concurrently and all of them settle
    /// before the call returns. The first failure, in field order, fails the
    /// whole build.
    pub async fn build_view(&self, owner: &str, name: &str) -> Result<ProjectView> {
        let project = self.github.project(owner, name).await?;

        let (contributors, participation, files, downloads) = tokio::join!(
            self.github.contributor_count(&project),
            self.github.participation(&project),
            self.github.files(&project),
            self.github.downloads(&project),
        );

        let view = ProjectView::assemble(
            project,
            contributors?,
            participation?,
            files?,
            downloads?,
        );
        info!(owner, name, "Built project view");
        Ok(view)
    }

    /// Serve the cached view, or start building it in the background.
    pub async fn request_view(
        &self,
        views: &ViewBuilder,
        owner: &str,
        name: &str,
    ) -> Result<ViewStatus<ProjectView>> {
        let aggregator = self.clone();
        let (owner, name) = (owner.to_string(), name.to_string());
        let path = Self::view_path(&owner, &name);

        views
            .request(&path, move || async move {
                aggregator.build_view(&owner, &name).await
            })
            .await
    }
}
