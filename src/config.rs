// Runtime configuration.
// Reads upstream endpoints, credentials, and cache settings from the environment.

use std::env;

use base64::{Engine, engine::general_purpose::STANDARD};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_NPM_API_URL: &str = "https://api.npmjs.org";
pub const DEFAULT_CACHE_DATABASE: &str = "memory://localhost/scavenger";

/// Cache settings shared by the response and view caches.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Connection string for the backing store.
    pub database: String,
    /// When false, caches never read or write their store.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_CACHE_DATABASE.to_string(),
            enabled: true,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub github_api_url: String,
    pub npm_api_url: String,
    pub github_token: Option<String>,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            npm_api_url: DEFAULT_NPM_API_URL.to_string(),
            github_token: None,
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Self {
        let github_api_url =
            env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_GITHUB_API_URL.to_string());
        let npm_api_url =
            env::var("NPM_API_URL").unwrap_or_else(|_| DEFAULT_NPM_API_URL.to_string());
        let github_token = env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());

        let database =
            env::var("CACHE_DATABASE").unwrap_or_else(|_| DEFAULT_CACHE_DATABASE.to_string());
        let enabled = env::var_os("DISABLE_CACHE").is_none();

        Self {
            github_api_url: trim_base(github_api_url),
            npm_api_url: trim_base(npm_api_url),
            github_token,
            cache: CacheConfig { database, enabled },
        }
    }

    /// Value for the Authorization header, if a token is configured.
    pub fn authorization(&self) -> Option<String> {
        self.github_token.as_ref().map(|token| {
            format!(
                "Basic {}",
                STANDARD.encode(format!("{}:x-oauth-basic", token))
            )
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
