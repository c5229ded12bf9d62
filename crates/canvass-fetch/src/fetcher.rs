//! HTTP GET with per-host-class throttling, transient retry and
//! rate-limit backoff.

use crate::error::{FetchError, Result};
use crate::host::{HostClass, HostGate, HostPolicy, RateLimitDecision};
use async_trait::async_trait;
use canvass_core::FetchConfig;
use reqwest::{Client, StatusCode};
use scraper::Html;
use std::error::Error as StdError;
use std::io;
use tracing::{debug, warn};
use url::Url;

/// A successfully fetched page.
///
/// The body is kept as text: `scraper::Html` is not `Send`, so parsing
/// happens on the consumer's side of any `.await`.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final request URL
    pub url: String,
    /// HTTP status (always 2xx)
    pub status: u16,
    /// Response body
    pub body: String,
}

impl FetchedPage {
    /// Parse the body as an HTML document.
    #[must_use]
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Source of upstream pages, keyed by host class.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch `url`, honoring the throttle and backoff rules of `class`.
    async fn fetch(&self, url: &str, class: HostClass) -> Result<FetchedPage>;
}

/// Rate-limited HTTP fetcher.
///
/// Share one instance (behind an `Arc`) across every worker: the gates it
/// owns are what make the per-class delay global.
pub struct Fetcher {
    client: Client,
    wiki: HostGate,
    profile: HostGate,
    search: HostGate,
}

impl Fetcher {
    /// Create a fetcher with the configured user agent, timeout and delays.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Self::with_policies(config, |class| HostPolicy::for_class(class, config))
    }

    /// Create a fetcher with explicit per-class policies.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_policies<F>(config: &FetchConfig, policy: F) -> Result<Self>
    where
        F: Fn(HostClass) -> HostPolicy,
    {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .map_err(|e| FetchError::Client(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            wiki: HostGate::new(HostClass::Wiki, policy(HostClass::Wiki)),
            profile: HostGate::new(HostClass::Profile, policy(HostClass::Profile)),
            search: HostGate::new(HostClass::Search, policy(HostClass::Search)),
        })
    }

    /// Gate arbitrating `class`.
    #[must_use]
    pub fn gate(&self, class: HostClass) -> &HostGate {
        match class {
            HostClass::Wiki => &self.wiki,
            HostClass::Profile => &self.profile,
            HostClass::Search => &self.search,
        }
    }

    async fn get(&self, url: &str, class: HostClass) -> Result<FetchedPage> {
        let target = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let gate = self.gate(class);
        let max_limits = gate.policy().max_rate_limit_retries;
        let mut transient_retried = false;
        let mut local_limits = 0u32;

        loop {
            gate.acquire().await;
            debug!(host = %class, url, "GET");

            let response = match self.client.get(target.clone()).send().await {
                Ok(response) => response,
                Err(e) if is_transient(&e) && !transient_retried => {
                    warn!(host = %class, url, error = %e, "Transient failure, retrying once");
                    transient_retried = true;
                    continue;
                }
                Err(e) => return Err(FetchError::failed(url, None, e.to_string())),
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && gate.policy().backs_off {
                local_limits += 1;
                match gate.record_rate_limit().await {
                    RateLimitDecision::Retry { .. } if local_limits <= max_limits => continue,
                    RateLimitDecision::Retry { .. } => {
                        return Err(FetchError::RateLimited {
                            host_class: class,
                            attempts: local_limits,
                        })
                    }
                    RateLimitDecision::GiveUp { attempts } => {
                        return Err(FetchError::RateLimited {
                            host_class: class,
                            attempts: attempts.max(local_limits),
                        })
                    }
                }
            }

            if !status.is_success() {
                return Err(FetchError::failed(
                    url,
                    Some(status.as_u16()),
                    status.canonical_reason().unwrap_or("unexpected status"),
                ));
            }

            let final_url = response.url().to_string();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) if is_transient(&e) && !transient_retried => {
                    warn!(host = %class, url, error = %e, "Body read interrupted, retrying once");
                    transient_retried = true;
                    continue;
                }
                Err(e) => return Err(FetchError::failed(url, Some(status.as_u16()), e.to_string())),
            };

            gate.record_success().await;
            return Ok(FetchedPage {
                url: final_url,
                status: status.as_u16(),
                body,
            });
        }
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch(&self, url: &str, class: HostClass) -> Result<FetchedPage> {
        self.get(url, class).await
    }
}

/// Timeouts and dropped connections are worth one more try.
fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }

    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::UnexpectedEof
            );
        }
        source = inner.source();
    }
    false
}
