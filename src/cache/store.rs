// Backing stores for the response and view caches.
// Entries carry their own expiry; expired entries read as absent from every store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::Expiry;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use crate::error::Result;

use super::paths;

/// Upper bound on entries held by an in-memory partition.
const MEMORY_CAPACITY: u64 = 100_000;

/// A cached value with its key and absolute expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// Create an entry that expires `ttl` from now.
    pub fn new(key: impl Into<String>, value: V, ttl: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            key: key.into(),
            value,
            expires_at,
        }
    }

    /// An entry is visible only while `now < expires_at`.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// TTL-capable key/value store holding JSON values.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch an unexpired entry.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<Value>>>;

    /// Insert or overwrite an entry.
    async fn set(&self, entry: CacheEntry<Value>) -> Result<()>;

    /// Drop every entry in the partition.
    async fn clear(&self) -> Result<()>;
}

struct EntryExpiry;

impl Expiry<String, CacheEntry<Value>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry<Value>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.remaining())
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry<Value>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.remaining())
    }
}

/// In-process store backed by a moka cache.
pub struct MemoryStore {
    entries: Cache<String, CacheEntry<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let entries = Cache::builder()
            .max_capacity(MEMORY_CAPACITY)
            .expire_after(EntryExpiry)
            .build();

        Self { entries }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        Ok(self
            .entries
            .get(key)
            .await
            .filter(|entry| !entry.is_expired()))
    }

    async fn set(&self, entry: CacheEntry<Value>) -> Result<()> {
        self.entries.insert(entry.key.clone(), entry).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.invalidate_all();
        Ok(())
    }
}

/// Store keeping one JSON file per key under a partition directory.
pub struct FileStore {
    root: PathBuf,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        let path = paths::entry_path(&self.root, key);

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry<Value> = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Discarding unreadable cache file");
                Self::remove(&path).await?;
                return Ok(None);
            }
        };

        if entry.is_expired() {
            Self::remove(&path).await?;
            return Ok(None);
        }

        // Distinct keys may share a truncated file name
        if entry.key != key {
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn set(&self, entry: CacheEntry<Value>) -> Result<()> {
        let path = paths::entry_path(&self.root, &entry.key);
        fs::create_dir_all(&self.root).await?;

        let json = serde_json::to_vec(&entry)?;

        // Write atomically via temp file
        let suffix = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_extension(format!("{}.tmp", suffix));
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &path).await?;

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn test_entry_expiry() {
        let fresh = CacheEntry::new("key", 1, DAY);
        assert!(!fresh.is_expired());
        assert!(fresh.remaining() > Duration::from_secs(60));

        let mut stale = CacheEntry::new("key", 1, DAY);
        stale.expires_at = Utc::now() - chrono::Duration::seconds(1);
        assert!(stale.is_expired());
        assert_eq!(stale.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new("key", (), Duration::MAX);
        assert_eq!(entry.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("a").await.unwrap().is_none());

        store
            .set(CacheEntry::new("a", json!({ "x": 1 }), DAY))
            .await
            .unwrap();
        let entry = store.get("a").await.unwrap().unwrap();
        assert_eq!(entry.value, json!({ "x": 1 }));

        store.clear().await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_hides_expired() {
        let store = MemoryStore::new();
        let mut entry = CacheEntry::new("a", json!(1), DAY);
        entry.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store.set(entry).await.unwrap();

        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("url_cache"));

        let key = "https://api.github.com/repos/owner/name?x=1";
        store
            .set(CacheEntry::new(key, json!([1, 2, 3]), DAY))
            .await
            .unwrap();

        let entry = store.get(key).await.unwrap().unwrap();
        assert_eq!(entry.key, key);
        assert_eq!(entry.value, json!([1, 2, 3]));
        assert!(store.get("https://other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());

        store.set(CacheEntry::new("k", json!(1), DAY)).await.unwrap();
        store.set(CacheEntry::new("k", json!(2), DAY)).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().unwrap().value, json!(2));
    }

    #[tokio::test]
    async fn test_file_store_removes_expired() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());

        let mut entry = CacheEntry::new("k", json!(1), DAY);
        entry.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store.set(entry).await.unwrap();

        assert!(store.get("k").await.unwrap().is_none());
        assert!(!paths::entry_path(temp_dir.path(), "k").exists());
    }

    #[tokio::test]
    async fn test_file_store_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("partition"));

        store.set(CacheEntry::new("k", json!(1), DAY)).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.get("k").await.unwrap().is_none());
        // Clearing an empty partition is fine
        store.clear().await.unwrap();
    }
}
