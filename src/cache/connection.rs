// Store connections.
// Parses the cache connection string and scopes a store's open/close lifecycle.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tokio::sync::RwLock;
use tracing::info;
use url::Url;

use crate::error::{Result, ScavengerError};

use super::paths;
use super::store::{FileStore, MemoryStore, Store};

/// Storage technology selected by the connection string scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// In-process store; contents live as long as the connection is open.
    Memory,
    /// JSON files under the given root directory.
    File(PathBuf),
}

/// Connection parameters derived from a single connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub backend: Backend,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub namespace: String,
}

impl ConnectionOptions {
    /// Parse `memory://[user:pass@]host[:port]/namespace` or `file://<dir>`.
    pub fn parse(connection: &str) -> Result<Self> {
        let url = Url::parse(connection)?;

        let username = Some(url.username())
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        let password = url.password().map(str::to_string);
        let host = url.host_str().map(str::to_string);
        let port = url.port();

        let (backend, namespace) = match url.scheme() {
            "memory" => (
                Backend::Memory,
                url.path().trim_start_matches('/').to_string(),
            ),
            "file" => {
                let root = match url.path() {
                    "" | "/" => paths::cache_dir().ok_or_else(|| {
                        ScavengerError::Config("no cache directory for this user".to_string())
                    })?,
                    path => PathBuf::from(path),
                };
                (Backend::File(root), String::new())
            }
            other => {
                return Err(ScavengerError::Config(format!(
                    "unsupported cache backend '{}'",
                    other
                )));
            }
        };

        Ok(Self {
            backend,
            host,
            port,
            username,
            password,
            namespace,
        })
    }
}

/// An explicitly opened and closed handle to one partition of a store.
pub struct Connection {
    options: ConnectionOptions,
    segment: String,
    store: RwLock<Option<Arc<dyn Store>>>,
}

impl Connection {
    /// Create a closed connection to the `segment` partition.
    pub fn new(options: ConnectionOptions, segment: impl Into<String>) -> Self {
        Self {
            options,
            segment: segment.into(),
            store: RwLock::new(None),
        }
    }

    pub fn from_string(connection: &str, segment: impl Into<String>) -> Result<Self> {
        Ok(Self::new(ConnectionOptions::parse(connection)?, segment))
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Open the backing store. Opening an open connection is a no-op.
    pub async fn open(&self) -> Result<()> {
        let mut guard = self.store.write().await;
        if guard.is_some() {
            return Ok(());
        }

        let store: Arc<dyn Store> = match &self.options.backend {
            Backend::Memory => Arc::new(MemoryStore::new()),
            Backend::File(root) => {
                let dir = paths::partition_dir(root, &self.options.namespace, &self.segment);
                fs::create_dir_all(&dir).await?;
                Arc::new(FileStore::new(dir))
            }
        };

        info!(segment = %self.segment, backend = ?self.options.backend, "Cache connection opened");
        *guard = Some(store);
        Ok(())
    }

    /// Release the backing store. Later access fails until reopened.
    pub async fn close(&self) {
        if self.store.write().await.take().is_some() {
            info!(segment = %self.segment, "Cache connection closed");
        }
    }

    pub async fn is_open(&self) -> bool {
        self.store.read().await.is_some()
    }

    /// The open store, or `Unavailable` outside the open/close window.
    pub async fn store(&self) -> Result<Arc<dyn Store>> {
        self.store.read().await.clone().ok_or_else(|| {
            ScavengerError::Unavailable(format!("{} connection is not open", self.segment))
        })
    }
}
