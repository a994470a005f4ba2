// Response cache for upstream GET requests.
// Cache-aside keyed by URL; only 2xx responses are ever stored.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::Result;

use super::connection::Connection;
use super::store::CacheEntry;

/// Lifetime of a cached response.
pub const RESPONSE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Partition name for raw responses.
pub const RESPONSE_SEGMENT: &str = "url_cache";

const DEFAULT_USER_AGENT: &str = "scavenger";

/// Status metadata and body of an upstream response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    /// Header names are lower-cased.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON, a JSON string for non-JSON bodies, or null when empty.
    pub body: Value,
}

impl CachedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Number of items when the body is a JSON array, otherwise zero.
    pub fn item_count(&self) -> usize {
        self.body.as_array().map_or(0, Vec::len)
    }
}

/// Cache-aside wrapper around upstream GET requests.
pub struct ResponseCache {
    client: Client,
    connection: Connection,
    enabled: bool,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache over `connection`. The connection is opened by [`start`](Self::start).
    pub fn new(connection: Connection, enabled: bool) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            connection,
            enabled,
            ttl: RESPONSE_TTL,
        })
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let connection = Connection::from_string(&config.database, RESPONSE_SEGMENT)?;
        Self::new(connection, config.enabled)
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

    /// Drop every cached response.
    pub async fn clear(&self) -> Result<()> {
        self.connection.store().await?.clear().await
    }

    /// Fetch `url`, serving from the cache when an unexpired entry exists.
    /// `headers` override the defaults on a miss.
    pub async fn get(&self, url: &str, headers: &HeaderMap) -> Result<CachedResponse> {
        let store = self.connection.store().await?;

        if self.enabled {
            if let Some(entry) = store.get(url).await? {
                if let Ok(response) = serde_json::from_value::<CachedResponse>(entry.value) {
                    debug!(%url, "Response cache hit");
                    return Ok(response);
                }
            }
        }

        debug!(%url, "Response cache miss");
        let response = self.fetch(url, headers).await?;

        if self.enabled && response.is_success() {
            let value = serde_json::to_value(&response)?;
            store.set(CacheEntry::new(url, value, self.ttl)).await?;
        }

        Ok(response)
    }

    async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<CachedResponse> {
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn started_cache(enabled: bool) -> ResponseCache {
        let connection =
            Connection::from_string("memory://localhost/test", RESPONSE_SEGMENT).unwrap();
        let cache = ResponseCache::new(connection, enabled).unwrap();
        cache.start().await.unwrap();
        cache
    }

    #[tokio::test]
    async fn test_success_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/some/path"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "key": "value" })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = started_cache(true).await;
        let url = format!("{}/some/path", server.uri());

        let first = cache.get(&url, &HeaderMap::new()).await.unwrap();
        let second = cache.get(&url, &HeaderMap::new()).await.unwrap();

        assert_eq!(first.status, 200);
        assert_eq!(first.body, json!({ "key": "value" }));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })),
            )
            .expect(3)
            .mount(&server)
            .await;

        let cache = started_cache(true).await;
        let url = format!("{}/missing", server.uri());

        for _ in 0..3 {
            let response = cache.get(&url, &HeaderMap::new()).await.unwrap();
            assert_eq!(response.status, 404);
            assert!(!response.is_success());
        }
    }

    #[tokio::test]
    async fn test_disabled_cache_always_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;

        let cache = started_cache(false).await;
        let url = format!("{}/list", server.uri());

        cache.get(&url, &HeaderMap::new()).await.unwrap();
        cache.get(&url, &HeaderMap::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_entries_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(1)))
            .expect(2)
            .mount(&server)
            .await;

        let cache = started_cache(true).await.with_ttl(Duration::ZERO);
        let url = format!("{}/short", server.uri());

        cache.get(&url, &HeaderMap::new()).await.unwrap();
        cache.get(&url, &HeaderMap::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_headers_override_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "custom-agent"))
            .and(header("authorization", "Basic abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain text"))
            .expect(1)
            .mount(&server)
            .await;

        let cache = started_cache(true).await;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("custom-agent"));
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));

        let response = cache
            .get(&format!("{}/text", server.uri()), &headers)
            .await
            .unwrap();
        assert_eq!(response.body, json!("plain text"));
    }

    #[tokio::test]
    async fn test_no_content_has_null_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let cache = started_cache(true).await;
        let response = cache
            .get(&format!("{}/orgs/o/members/m", server.uri()), &HeaderMap::new())
            .await
            .unwrap();

        assert_eq!(response.status, 204);
        assert_eq!(response.body, Value::Null);
        assert_eq!(response.item_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_outside_lifecycle() {
        let connection =
            Connection::from_string("memory://localhost/test", RESPONSE_SEGMENT).unwrap();
        let cache = ResponseCache::new(connection, true).unwrap();

        let error = cache
            .get("http://127.0.0.1:1/never", &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unavailable);

        cache.start().await.unwrap();
        cache.stop().await;

        let error = cache
            .get("http://127.0.0.1:1/never", &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let cache = started_cache(true).await;
        let error = cache
            .get("http://127.0.0.1:1/refused", &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = BTreeMap::new();
        headers.insert("link".to_string(), "<x>; rel=\"next\"".to_string());
        let response = CachedResponse {
            status: 200,
            headers,
            body: json!([1, 2]),
        };

        assert_eq!(response.header("Link"), Some("<x>; rel=\"next\""));
        assert_eq!(response.item_count(), 2);
    }
}
