// Package manager ecosystems.
// Ordered registry of adapters that detect a project's ecosystem and report its downloads.

pub mod npm;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::Result;
use crate::github::{GitHubClient, Repository};

pub use npm::Npm;

/// An ecosystem whose packages can be traced back to a repository.
#[async_trait]
pub trait PackageManager: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `project` publishes a package in this ecosystem.
    async fn matches(&self, project: &Repository) -> Result<bool>;

    /// Downloads of the project's package over the last 30 days.
    async fn downloads(&self, project: &Repository) -> Result<u64>;
}

/// Package managers in priority order; the first match wins.
#[derive(Default)]
pub struct PackageRegistry {
    managers: Vec<Box<dyn PackageManager>>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every supported ecosystem.
    pub fn with_defaults(client: GitHubClient, npm_api_url: &str) -> Self {
        Self::new().register(Npm::new(client, npm_api_url))
    }

    pub fn register(mut self, manager: impl PackageManager + 'static) -> Self {
        self.managers.push(Box::new(manager));
        self
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// First manager, in registration order, that claims `project`.
    ///
    /// All managers are probed concurrently. A manager whose probe fails is
    /// treated as not matching.
    pub async fn select(&self, project: &Repository) -> Option<&dyn PackageManager> {
        let probes = join_all(self.managers.iter().map(|m| m.matches(project))).await;

        self.managers
            .iter()
            .zip(probes)
            .find_map(|(manager, probe)| match probe {
                Ok(true) => Some(manager.as_ref()),
                Ok(false) => None,
                Err(e) => {
                    warn!(
                        manager = manager.name(),
                        project = %project.name,
                        error = %e,
                        "Package manager probe failed"
                    );
                    None
                }
            })
    }

    /// Downloads reported by the matching ecosystem, `None` when nothing matches.
    pub async fn downloads(&self, project: &Repository) -> Result<Option<u64>> {
        match self.select(project).await {
            Some(manager) => {
                debug!(manager = manager.name(), project = %project.name, "Fetching downloads");
                manager.downloads(project).await.map(Some)
            }
            None => Ok(None),
        }
    }
}
