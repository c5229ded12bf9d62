//! Web search seam and the DuckDuckGo HTML implementation.

use crate::error::SearchError;
use crate::fetcher::PageSource;
use crate::host::HostClass;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Target URL
    pub url: String,
    /// Result title
    pub title: String,
    /// Result snippet
    pub snippet: String,
}

/// Abstract web search.
///
/// Implementations must report throttling as [`SearchError::RateLimited`]
/// so callers can tell it apart from other failures.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run `query`, optionally restricted to `site`, returning ranked hits.
    async fn search(
        &self,
        query: &str,
        site: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError>;

    /// Stable provider identifier.
    fn provider_id(&self) -> &str;
}

/// DuckDuckGo's JavaScript-free results page, fetched through the search
/// host class so its throttle and backoff apply.
pub struct DuckDuckGoSearch {
    pages: Arc<dyn PageSource>,
    endpoint: String,
}

impl DuckDuckGoSearch {
    /// Default results endpoint.
    pub const ENDPOINT: &'static str = "https://html.duckduckgo.com/html/";

    /// Search through `pages` against the public endpoint.
    #[must_use]
    pub fn new(pages: Arc<dyn PageSource>) -> Self {
        Self::with_endpoint(pages, Self::ENDPOINT)
    }

    /// Search through `pages` against a custom endpoint.
    #[must_use]
    pub fn with_endpoint(pages: Arc<dyn PageSource>, endpoint: impl Into<String>) -> Self {
        Self {
            pages,
            endpoint: endpoint.into(),
        }
    }

    fn build_url(&self, query: &str, site: Option<&str>) -> Result<Url, SearchError> {
        let q = match site {
            Some(site) => format!("site:{site} {query}"),
            None => query.to_string(),
        };
        Url::parse_with_params(&self.endpoint, &[("q", q.as_str())])
            .map_err(|e| SearchError::Failed(format!("invalid search endpoint: {e}")))
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(
        &self,
        query: &str,
        site: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let url = self.build_url(query, site)?;
        let page = self
            .pages
            .fetch(url.as_str(), HostClass::Search)
            .await
            .map_err(|e| SearchError::from_fetch(self.provider_id(), e))?;

        let hits = parse_results(&page.body, max_results);
        debug!(query, ?site, hits = hits.len(), "Search complete");
        Ok(hits)
    }

    fn provider_id(&self) -> &str {
        "duckduckgo"
    }
}

static RESULT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.result").expect("valid selector"));
static TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.result__a").expect("valid selector"));
static SNIPPET: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".result__snippet").expect("valid selector"));

/// Parse a DuckDuckGo HTML results page, skipping sponsored entries.
#[must_use]
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let doc = Html::parse_document(html);

    doc.select(&RESULT)
        .filter(|r| !r.value().classes().any(|c| c == "result--ad"))
        .filter_map(|r| {
            let anchor = r.select(&TITLE).next()?;
            let url = decode_redirect(anchor.value().attr("href")?)?;
            let title = collapse(anchor.text());
            let snippet = r
                .select(&SNIPPET)
                .next()
                .map(|s| collapse(s.text()))
                .unwrap_or_default();
            Some(SearchHit {
                url,
                title,
                snippet,
            })
        })
        .take(max_results)
        .collect()
}

/// Unwrap `//duckduckgo.com/l/?uddg=<target>` redirect links.
fn decode_redirect(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;

    let is_redirect = parsed
        .host_str()
        .is_some_and(|h| h.ends_with("duckduckgo.com"))
        && parsed.path().starts_with("/l/");
    if is_redirect {
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }

    matches!(parsed.scheme(), "http" | "https").then_some(absolute)
}

fn collapse<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, Result as FetchResult};
    use crate::fetcher::FetchedPage;
    use std::sync::Mutex;

    const FIXTURE: &str = r##"
<html><body>
<div class="result results_links result--ad">
  <h2 class="result__title"><a class="result__a" href="https://ads.example.com/">Sponsored</a></h2>
</div>
<div class="result results_links web-result">
  <h2 class="result__title">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fjanedoe2024.com%2F&amp;rut=abc">Jane  Doe for
      Congress</a>
  </h2>
  <a class="result__snippet" href="#">Official campaign of Jane Doe, Ohio.</a>
</div>
<div class="result results_links web-result">
  <h2 class="result__title"><a class="result__a" href="https://ballotpedia.org/Jane_Doe">Jane Doe - Ballotpedia</a></h2>
</div>
<div class="result results_links web-result">
  <h2 class="result__title"><a class="result__a" href="https://example.org/third">Third</a></h2>
</div>
</body></html>
"##;

    struct CannedPages {
        body: String,
        requested: Mutex<Vec<(String, HostClass)>>,
    }

    #[async_trait]
    impl PageSource for CannedPages {
        async fn fetch(&self, url: &str, class: HostClass) -> FetchResult<FetchedPage> {
            self.requested
                .lock()
                .expect("lock")
                .push((url.to_string(), class));
            Ok(FetchedPage {
                url: url.to_string(),
                status: 200,
                body: self.body.clone(),
            })
        }
    }

    struct Throttled;

    #[async_trait]
    impl PageSource for Throttled {
        async fn fetch(&self, _url: &str, class: HostClass) -> FetchResult<FetchedPage> {
            Err(FetchError::RateLimited {
                host_class: class,
                attempts: 4,
            })
        }
    }

    #[test]
    fn test_parse_results_skips_ads_and_decodes_redirects() {
        let hits = parse_results(FIXTURE, 10);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].url, "https://janedoe2024.com/");
        assert_eq!(hits[0].title, "Jane Doe for Congress");
        assert_eq!(hits[0].snippet, "Official campaign of Jane Doe, Ohio.");
        assert_eq!(hits[1].url, "https://ballotpedia.org/Jane_Doe");
        assert!(hits[1].snippet.is_empty());
    }

    #[test]
    fn test_parse_results_honors_max() {
        assert_eq!(parse_results(FIXTURE, 2).len(), 2);
        assert!(parse_results("<html></html>", 5).is_empty());
    }

    #[tokio::test]
    async fn test_site_restriction_goes_through_search_class() {
        let pages = Arc::new(CannedPages {
            body: FIXTURE.to_string(),
            requested: Mutex::new(Vec::new()),
        });
        let search = DuckDuckGoSearch::new(pages.clone());

        let hits = search
            .search("\"Jane Doe\" Ohio", Some("ballotpedia.org"), 5)
            .await
            .expect("search");
        assert_eq!(hits.len(), 3);

        let requested = pages.requested.lock().expect("lock");
        assert_eq!(requested.len(), 1);
        let (url, class) = &requested[0];
        assert_eq!(*class, HostClass::Search);
        let parsed = Url::parse(url).expect("valid url");
        let q = parsed
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned());
        assert_eq!(q.as_deref(), Some("site:ballotpedia.org \"Jane Doe\" Ohio"));
    }

    #[tokio::test]
    async fn test_rate_limit_is_distinguishable() {
        let search = DuckDuckGoSearch::new(Arc::new(Throttled));
        let err = search.search("anything", None, 5).await.expect_err("throttled");
        assert!(matches!(err, SearchError::RateLimited { .. }));
    }
}
