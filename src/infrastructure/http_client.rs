//! HTTP client for fetching remote targets
//!
//! Wraps `reqwest` with a rate limiter so repeated scrapes through one client
//! stay polite towards the remote server.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::{
    Client, Response,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::infrastructure::config::defaults;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub follow_redirects: bool,
    /// Honor `HTTP_PROXY`/`HTTPS_PROXY` from the environment
    pub use_system_proxy: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            follow_redirects: true,
            use_system_proxy: true,
        }
    }
}

/// HTTP client with rate limiting
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> ScrapeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).map_err(|e| ScrapeError::Configuration {
                message: format!("invalid user agent: {e}"),
            })?,
        );

        let mut builder = Client::builder();
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| ScrapeError::Configuration {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        let quota = Quota::per_second(NonZeroU32::new(config.max_requests_per_second).ok_or_else(
            || ScrapeError::Configuration {
                message: "rate limit must be greater than 0".to_string(),
            },
        )?);

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            config,
        })
    }

    /// Fetch a URI, rejecting non-success statuses
    pub async fn get(&self, uri: &str) -> ScrapeResult<Response> {
        let url = parse_uri(uri)?;
        self.rate_limiter.until_ready().await;

        tracing::info!("Fetching URI: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ScrapeError::Uri {
                uri: uri.to_string(),
                source,
            })?;

        check_status(uri, response)
    }

    /// Fetch a URI, aborting as soon as `cancellation_token` fires
    pub async fn get_with_cancellation(
        &self,
        uri: &str,
        cancellation_token: CancellationToken,
    ) -> ScrapeResult<Option<Response>> {
        let url = parse_uri(uri)?;

        if cancellation_token.is_cancelled() {
            tracing::debug!("Request cancelled before starting: {}", uri);
            return Ok(None);
        }

        tokio::select! {
            () = self.rate_limiter.until_ready() => {},
            () = cancellation_token.cancelled() => {
                tracing::debug!("Request cancelled during rate limiting: {}", uri);
                return Ok(None);
            }
        }

        let response = tokio::select! {
            result = self.client.get(url).send() => {
                result.map_err(|source| ScrapeError::Uri { uri: uri.to_string(), source })?
            },
            () = cancellation_token.cancelled() => {
                tracing::warn!("🛑 HTTP request cancelled for URI: {}", uri);
                return Ok(None);
            }
        };

        check_status(uri, response).map(Some)
    }

    /// Get the configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

fn parse_uri(uri: &str) -> ScrapeResult<Url> {
    Url::parse(uri).map_err(|source| ScrapeError::InvalidUri {
        uri: uri.to_string(),
        source,
    })
}

fn check_status(uri: &str, response: Response) -> ScrapeResult<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::HttpStatus {
            uri: uri.to_string(),
            status: status.as_u16(),
        });
    }

    tracing::debug!("Successfully fetched: {} ({})", uri, status);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        let client = HttpClient::new(HttpClientConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_zero_rate_limit_is_rejected() {
        let config = HttpClientConfig {
            max_requests_per_second: 0,
            ..Default::default()
        };
        assert!(matches!(
            HttpClient::new(config),
            Err(ScrapeError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_uri_is_rejected_before_sending() {
        let client = HttpClient::new(HttpClientConfig::default()).unwrap();
        let result = client.get("not a uri").await;
        assert!(matches!(result, Err(ScrapeError::InvalidUri { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_request_returns_none() {
        let client = HttpClient::new(HttpClientConfig::default()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = client
            .get_with_cancellation("http://127.0.0.1:9/", token)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
