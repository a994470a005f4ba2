// GitHub API transport.
// Routes every request through the response cache and attaches credentials.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::cache::{CachedResponse, ResponseCache};
use crate::config::Config;
use crate::error::{Result, ScavengerError};

use super::pagination;
use super::types::ContentEntry;

/// Cached, optionally authenticated access to the GitHub REST API.
#[derive(Clone)]
pub struct GitHubClient {
    cache: Arc<ResponseCache>,
    base_url: String,
    headers: HeaderMap,
}

impl GitHubClient {
    /// Create a client using the API location and token from `config`.
    pub fn new(cache: Arc<ResponseCache>, config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();

        match config.authorization() {
            Some(credentials) => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&credentials)
                        .map_err(|e| ScavengerError::Config(e.to_string()))?,
                );
            }
            None => warn!(
                "GITHUB_TOKEN is not defined. \
                 Unauthenticated API requests are subject to lower rate limits."
            ),
        }

        Ok(Self {
            cache,
            base_url: config.github_api_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Absolute URL for an API path such as `/repos/owner/name`.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Make a GET request to an API path.
    pub async fn get(&self, endpoint: &str) -> Result<CachedResponse> {
        self.get_url(&self.url(endpoint)).await
    }

    /// Make a GET request to an absolute GitHub URL, e.g. a pagination link.
    pub async fn get_url(&self, url: &str) -> Result<CachedResponse> {
        self.cache.get(url, &self.headers).await
    }

    /// Make a GET request without credentials, for hosts other than the API.
    pub async fn get_public(&self, url: &str) -> Result<CachedResponse> {
        self.cache.get(url, &HeaderMap::new()).await
    }

    /// Collect every item of a paginated API path.
    pub async fn consume_pages<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        pagination::consume_pages(&self.cache, &self.headers, &self.url(endpoint)).await
    }

    /// Root content listing of a repository.
    pub async fn contents(&self, owner: &str, name: &str) -> Result<Vec<ContentEntry>> {
        let response = self.get(&format!("/repos/{}/{}/contents", owner, name)).await?;
        if !response.is_success() {
            return Err(ScavengerError::server(response.status, &response.body));
        }
        pagination::page_items(response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Connection;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer, token: Option<&str>) -> GitHubClient {
        let connection = Connection::from_string("memory://localhost/test", "url_cache").unwrap();
        let cache = ResponseCache::new(connection, true).unwrap();
        cache.start().await.unwrap();

        let config = Config {
            github_api_url: server.uri(),
            github_token: token.map(str::to_string),
            ..Config::default()
        };
        GitHubClient::new(Arc::new(cache), &config).unwrap()
    }

    #[tokio::test]
    async fn test_includes_credentials() {
        let server = MockServer::start().await;
        let expected = Config {
            github_token: Some("atokenvalue".to_string()),
            ..Config::default()
        }
        .authorization()
        .unwrap();

        Mock::given(method("GET"))
            .and(path("/repos/octo/thing"))
            .and(header("authorization", expected.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("atokenvalue")).await;
        let response = client.get("/repos/octo/thing").await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_public_requests_omit_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "pkg" })))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("atokenvalue")).await;
        let response = client
            .get_public(&format!("{}/raw/package.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_contents_failure_is_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/thing/contents"))
            .respond_with(ResponseTemplate::new(500).set_body_string("nope"))
            .mount(&server)
            .await;

        let client = client_for(&server, None).await;
        let error = client.contents("octo", "thing").await.unwrap_err();
        assert!(matches!(error, ScavengerError::Server { status: 500, .. }));
    }
}
