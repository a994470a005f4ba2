// View cache for fully built views keyed by request path.
// Misses answer immediately with `Building` while the view is built in the background.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::Result;

use super::connection::Connection;
use super::store::CacheEntry;

/// Lifetime of a cached view.
pub const VIEW_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Partition name for built views.
pub const VIEW_SEGMENT: &str = "view_cache";

/// Cache-aside store of built views.
///
/// Unlike [`ResponseCache`](super::ResponseCache), views are always stored:
/// disabling the cache only bypasses upstream responses.
pub struct ViewCache {
    connection: Connection,
    ttl: Duration,
}

impl ViewCache {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            ttl: VIEW_TTL,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let connection = Connection::from_string(&config.database, VIEW_SEGMENT)?;
        Ok(Self::new(connection))
    }

    /// Override the entry lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn start(&self) -> Result<()> {
        self.connection.open().await
    }

    pub async fn stop(&self) {
        self.connection.close().await;
    }

    pub async fn clear(&self) -> Result<()> {
        self.connection.store().await?.clear().await
    }

    /// The cached view for `path`, or `None` when absent or expired.
    pub async fn get<V: DeserializeOwned>(&self, path: &str) -> Result<Option<V>> {
        let store = self.connection.store().await?;
        match store.get(path).await? {
            Some(entry) => Ok(Some(serde_json::from_value(entry.value)?)),
            None => Ok(None),
        }
    }

    /// Store `view` under `path`, replacing any previous entry.
    pub async fn set<V: Serialize>(&self, path: &str, view: &V) -> Result<()> {
        let store = self.connection.store().await?;
        let value = serde_json::to_value(view)?;
        store.set(CacheEntry::new(path, value, self.ttl)).await
    }
}

/// Outcome of a view request.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewStatus<V> {
    /// The view was cached.
    Ready(V),
    /// No cached view; a build is running in the background.
    Building,
}

impl<V> ViewStatus<V> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ViewStatus::Ready(_))
    }

    pub fn into_view(self) -> Option<V> {
        match self {
            ViewStatus::Ready(view) => Some(view),
            ViewStatus::Building => None,
        }
    }
}

/// Serves cached views and schedules background builds on a miss.
///
/// At most one build runs per path: a miss observed while a build for the
/// same path is in flight reports `Building` without starting another. The
/// in-flight mark is dropped when the build settles, whether it succeeded
/// or not, so a failed build is retried by the next miss.
#[derive(Clone)]
pub struct ViewBuilder {
    cache: Arc<ViewCache>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ViewBuilder {
    pub fn new(cache: Arc<ViewCache>) -> Self {
        Self {
            cache,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn cache(&self) -> &Arc<ViewCache> {
        &self.cache
    }

    /// Whether a build for `path` is currently running.
    pub async fn is_building(&self, path: &str) -> bool {
        self.in_flight.lock().await.contains(path)
    }

    /// Return the cached view for `path`, or start `build` and report `Building`.
    ///
    /// `build` is only invoked when a new build is actually started.
    pub async fn request<V, F, Fut>(&self, path: &str, build: F) -> Result<ViewStatus<V>>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if let Some(view) = self.cache.get(path).await? {
            debug!(%path, "View cache hit");
            return Ok(ViewStatus::Ready(view));
        }

        if !self.in_flight.lock().await.insert(path.to_string()) {
            debug!(%path, "View already building");
            return Ok(ViewStatus::Building);
        }

        // A build may have finished between the miss and the mark
        let cached = match self.cache.get(path).await {
            Ok(cached) => cached,
            Err(e) => {
                self.in_flight.lock().await.remove(path);
                return Err(e);
            }
        };
        if let Some(view) = cached {
            self.in_flight.lock().await.remove(path);
            debug!(%path, "View cached while marking");
            return Ok(ViewStatus::Ready(view));
        }

        info!(%path, "Building view");
        let pending = tokio::spawn(build());
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let path = path.to_string();

        tokio::spawn(async move {
            match pending.await {
                Ok(Ok(view)) => match cache.set(&path, &view).await {
                    Ok(()) => info!(%path, "View cached"),
                    Err(e) => warn!(%path, error = %e, "Failed to cache view"),
                },
                Ok(Err(e)) => warn!(%path, error = %e, "View build failed"),
                Err(e) => warn!(%path, error = %e, "View build aborted"),
            }
            in_flight.lock().await.remove(&path);
        });

        Ok(ViewStatus::Building)
    }
}
