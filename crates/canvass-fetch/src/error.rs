use crate::host::HostClass;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch failed for {url} (status {status:?}): {reason}")]
    FetchFailed {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("rate limited by {host_class} after {attempts} attempts")]
    RateLimited { host_class: HostClass, attempts: u32 },

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("http client error: {0}")]
    Client(String),
}

impl FetchError {
    pub(crate) fn failed(url: &str, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.to_string(),
            status,
            reason: reason.into(),
        }
    }

    /// HTTP status attached to the failure, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::FetchFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// A 404 is a recoverable signal for callers with an alternate page.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search provider {provider} is rate limiting requests")]
    RateLimited { provider: String },

    #[error("search failed: {0}")]
    Failed(String),
}

impl SearchError {
    pub(crate) fn from_fetch(provider: &str, err: FetchError) -> Self {
        match err {
            FetchError::RateLimited { .. } => Self::RateLimited {
                provider: provider.to_string(),
            },
            other => Self::Failed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FetchError::failed("https://example.com/x", Some(503), "Service Unavailable");
        assert_eq!(
            err.to_string(),
            "fetch failed for https://example.com/x (status Some(503)): Service Unavailable"
        );
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_is_recoverable() {
        let err = FetchError::failed("https://example.com/missing", Some(404), "Not Found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rate_limit_maps_to_search_error() {
        let err = FetchError::RateLimited {
            host_class: HostClass::Search,
            attempts: 4,
        };
        assert!(err.to_string().contains("search-source"));
        assert!(matches!(
            SearchError::from_fetch("duckduckgo", err),
            SearchError::RateLimited { .. }
        ));

        let err = FetchError::failed("https://example.com", Some(500), "boom");
        assert!(matches!(
            SearchError::from_fetch("duckduckgo", err),
            SearchError::Failed(_)
        ));
    }
}
