// Link-relation pagination.
// Parses `Link` headers and walks "next" relations through the response cache.

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::cache::{CachedResponse, ResponseCache};
use crate::error::{Result, ScavengerError};

/// One target of a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    /// Value of the `page` query parameter, when present and numeric.
    pub page: Option<u64>,
}

impl Link {
    fn new(url: &str) -> Self {
        let page = Url::parse(url).ok().and_then(|parsed| {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "page")
                .and_then(|(_, value)| value.parse().ok())
        });

        Self {
            url: url.to_string(),
            page,
        }
    }
}

/// The pagination relations of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links {
    pub next: Option<Link>,
    pub last: Option<Link>,
}

impl Links {
    /// Parse a header such as `<https://…?page=2>; rel="next", <https://…?page=5>; rel="last"`.
    pub fn parse(header: &str) -> Self {
        let mut links = Links::default();

        for part in header.split(',') {
            let part = part.trim();
            let Some(rest) = part.strip_prefix('<') else {
                continue;
            };
            let Some((target, params)) = rest.split_once('>') else {
                continue;
            };

            for param in params.split(';') {
                let Some((name, value)) = param.trim().split_once('=') else {
                    continue;
                };
                if !name.trim().eq_ignore_ascii_case("rel") {
                    continue;
                }

                for rel in value.trim().trim_matches('"').split_whitespace() {
                    match rel {
                        "next" => links.next = Some(Link::new(target)),
                        "last" => links.last = Some(Link::new(target)),
                        _ => {}
                    }
                }
            }
        }

        links
    }

    /// Relations carried by a response, empty when it has no `Link` header.
    pub fn from_response(response: &CachedResponse) -> Self {
        response.header("link").map(Self::parse).unwrap_or_default()
    }
}

/// Decode a page body; an empty body is an empty page.
pub fn page_items<T: DeserializeOwned>(body: Value) -> Result<Vec<T>> {
    match body {
        Value::Null => Ok(Vec::new()),
        body => Ok(serde_json::from_value(body)?),
    }
}

/// Follow "next" relations from `start_url`, concatenating items in page order.
///
/// Any non-2xx page fails the whole walk; items from earlier pages are dropped.
pub async fn consume_pages<T: DeserializeOwned>(
    cache: &ResponseCache,
    headers: &HeaderMap,
    start_url: &str,
) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut next = Some(start_url.to_string());
    let mut pages = 0usize;

    while let Some(url) = next.take() {
        let response = cache.get(&url, headers).await?;
        if !response.is_success() {
            return Err(ScavengerError::server(response.status, &response.body));
        }

        pages += 1;
        let links = Links::from_response(&response);
        items.extend(page_items::<T>(response.body)?);
        next = links.next.map(|link| link.url);
    }

    debug!(%start_url, pages, items = items.len(), "Consumed pages");
    Ok(items)
}
