//! Two-tier campaign contact resolution.
//!
//! Tier 1 looks the candidate up on the profile site and reads the contact
//! section of their profile. Tier 2 scores general web search hits. Either
//! tier failing only means that tier found nothing; [`ResolutionEngine`]
//! never surfaces fetch or search errors to its caller.

use crate::cache::ResolutionCache;
use crate::error::Result;
use crate::scoring::score_hit;
use canvass_core::{
    CandidateIdentity, ContactLink, LinkSource, LinkType, ResolutionConfig, ResolutionResult,
};
use canvass_extract::{extract_contacts, RaceFamily, SourceKind};
use canvass_fetch::{HostClass, PageSource, SearchError, SearchProvider};
use futures::stream::{FuturesUnordered, StreamExt};
use scraper::Html;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Domain searched by the profile tier.
pub const PROFILE_SITE: &str = "ballotpedia.org";

/// Race context feeding the search query templates.
///
/// Never part of the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchContext {
    /// Election year
    pub year: i32,
    /// Race keyword such as `"congress"` or `"governor"`
    pub race_keyword: String,
}

impl SearchContext {
    /// Create a context.
    #[must_use]
    pub fn new(year: i32, race_keyword: impl Into<String>) -> Self {
        Self {
            year,
            race_keyword: race_keyword.into(),
        }
    }

    /// Context for a candidate of `family` running in `year`.
    #[must_use]
    pub fn for_family(family: RaceFamily, year: i32) -> Self {
        Self::new(year, family.search_keyword())
    }
}

/// Profile-tier query: `"<name>" <state> <keyword> <year>`.
#[must_use]
pub fn profile_query(identity: &CandidateIdentity, ctx: &SearchContext) -> String {
    format!(
        "\"{}\" {} {} {}",
        identity.name(),
        identity.state(),
        ctx.race_keyword,
        ctx.year
    )
}

/// Web-tier query variations, in the order they are tried.
#[must_use]
pub fn web_queries(identity: &CandidateIdentity, ctx: &SearchContext) -> Vec<String> {
    let name = identity.name();
    let state = identity.state();
    let SearchContext { year, race_keyword } = ctx;

    let mut queries = vec![
        format!("\"{name}\" {state} {year} {race_keyword} campaign official website"),
        format!("\"{name}\" for {race_keyword} {year} {state}"),
    ];
    if !identity.party().is_empty() {
        queries.push(format!(
            "\"{name}\" {} {state} campaign website",
            identity.party()
        ));
    }
    queries
}

fn is_profile_url(url: &str) -> bool {
    url.contains("ballotpedia.org/") && !url.contains("/wiki/")
}

#[derive(Default)]
struct ProfileOutcome {
    url: Option<String>,
    links: Vec<ContactLink>,
}

/// Resolves candidate identities to campaign sites, caching every outcome.
///
/// The cache is owned here; callers only see results.
pub struct ResolutionEngine {
    search: Arc<dyn SearchProvider>,
    pages: Arc<dyn PageSource>,
    cache: Mutex<ResolutionCache>,
    config: ResolutionConfig,
}

impl ResolutionEngine {
    /// Create an engine over an opened cache.
    #[must_use]
    pub fn new(
        search: Arc<dyn SearchProvider>,
        pages: Arc<dyn PageSource>,
        cache: ResolutionCache,
        config: ResolutionConfig,
    ) -> Self {
        Self {
            search,
            pages,
            cache: Mutex::new(cache),
            config,
        }
    }

    /// Active resolution settings.
    #[must_use]
    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Context used by [`resolve`](Self::resolve).
    #[must_use]
    pub fn default_context(&self) -> SearchContext {
        SearchContext::new(self.config.election_year, "election")
    }

    /// Resolve with the configured election year and a generic keyword.
    pub async fn resolve(&self, identity: &CandidateIdentity) -> ResolutionResult {
        self.resolve_with(identity, &self.default_context()).await
    }

    /// Resolve `identity`, returning the cached result unchanged on a hit.
    ///
    /// Misses run both tiers as needed and the outcome, found or not, is
    /// cached before returning. With `force_refresh` set the lookup is
    /// skipped and the entry overwritten.
    pub async fn resolve_with(
        &self,
        identity: &CandidateIdentity,
        ctx: &SearchContext,
    ) -> ResolutionResult {
        let key = identity.cache_key();
        if !self.config.force_refresh {
            if let Some(hit) = self.cache.lock().await.get(&key) {
                debug!(%key, "Cache hit");
                return hit.clone();
            }
        }

        let result = self.resolve_uncached(identity, ctx).await;
        self.store(key, result.clone()).await;
        result
    }

    /// Resolve every request, at most `concurrency` at a time, then flush.
    ///
    /// Requests sharing a cache key are resolved once and the result is
    /// repeated for each of them. Results are returned in request order.
    /// Only the final flush can fail the batch.
    pub async fn resolve_batch(
        &self,
        requests: &[(CandidateIdentity, SearchContext)],
    ) -> Result<Vec<ResolutionResult>> {
        let limit = self.config.concurrency.max(1);

        // Index of the first request for each key, per request.
        let mut first_of: HashMap<String, usize> = HashMap::new();
        let owners: Vec<usize> = requests
            .iter()
            .enumerate()
            .map(|(i, (identity, _))| *first_of.entry(identity.cache_key()).or_insert(i))
            .collect();

        let mut slots: Vec<Option<ResolutionResult>> = vec![None; requests.len()];
        let mut pending = FuturesUnordered::new();

        for (i, (identity, ctx)) in requests.iter().enumerate() {
            if owners[i] != i {
                continue;
            }
            pending.push(async move { (i, self.resolve_with(identity, ctx).await) });

            while pending.len() >= limit {
                if let Some((i, result)) = pending.next().await {
                    slots[i] = Some(result);
                }
            }
        }
        while let Some((i, result)) = pending.next().await {
            slots[i] = Some(result);
        }

        self.flush().await?;

        if owners.iter().enumerate().any(|(i, owner)| *owner != i) {
            debug!(
                requests = requests.len(),
                unique = first_of.len(),
                "Collapsed duplicate batch requests"
            );
        }
        let results: Vec<ResolutionResult> = owners
            .iter()
            .filter_map(|owner| slots[*owner].clone())
            .collect();
        let found = results.iter().filter(|r| r.found).count();
        info!(total = results.len(), found, "Batch resolution complete");
        Ok(results)
    }

    /// Flush the cache now.
    pub async fn flush(&self) -> Result<()> {
        self.cache.lock().await.flush()
    }

    /// Cached result for `identity`, without resolving.
    pub async fn cached(&self, identity: &CandidateIdentity) -> Option<ResolutionResult> {
        self.cache.lock().await.get(&identity.cache_key()).cloned()
    }

    /// Give the cache back, e.g. to inspect it after a run.
    #[must_use]
    pub fn into_cache(self) -> ResolutionCache {
        self.cache.into_inner()
    }

    async fn store(&self, key: String, result: ResolutionResult) {
        let mut cache = self.cache.lock().await;
        cache.insert(key, result);
        if cache.unflushed() >= self.config.flush_interval.max(1) {
            if let Err(e) = cache.flush() {
                error!(path = %cache.path().display(), error = %e, "Failed to flush resolution cache");
            }
        }
    }

    async fn resolve_uncached(
        &self,
        identity: &CandidateIdentity,
        ctx: &SearchContext,
    ) -> ResolutionResult {
        let ProfileOutcome {
            url: profile_url,
            mut links,
        } = self.profile_tier(identity, ctx).await;

        if let Some(pos) = links
            .iter()
            .position(|l| l.link_type == LinkType::CampaignSite)
        {
            let site = links.remove(pos);
            info!(candidate = %identity, url = %site.url, "Resolved from profile");
            return ResolutionResult::found(site).with_profile(profile_url, links);
        }

        let result = match self.web_tier(identity, ctx).await {
            Some(link) => {
                info!(candidate = %identity, url = %link.url, confidence = link.confidence, "Resolved from web search");
                ResolutionResult::found(link)
            }
            None => {
                info!(candidate = %identity, "No campaign site found");
                ResolutionResult::not_found()
            }
        };
        result.with_profile(profile_url, links)
    }

    async fn profile_tier(
        &self,
        identity: &CandidateIdentity,
        ctx: &SearchContext,
    ) -> ProfileOutcome {
        let query = profile_query(identity, ctx);
        let hits = match self
            .search
            .search(&query, Some(PROFILE_SITE), self.config.profile_max_results)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(candidate = %identity, error = %e, "Profile search failed");
                return ProfileOutcome::default();
            }
        };

        let Some(url) = hits.into_iter().map(|h| h.url).find(|u| is_profile_url(u)) else {
            debug!(candidate = %identity, "No profile page in search results");
            return ProfileOutcome::default();
        };

        let page = match self.pages.fetch(&url, HostClass::Profile).await {
            Ok(page) => page,
            Err(e) => {
                warn!(candidate = %identity, %url, error = %e, "Profile fetch failed");
                return ProfileOutcome {
                    url: Some(url),
                    links: Vec::new(),
                };
            }
        };

        let links = {
            let doc = Html::parse_document(&page.body);
            extract_contacts(doc.root_element(), SourceKind::Ballotpedia)
        };
        debug!(candidate = %identity, %url, links = links.len(), "Read profile contacts");
        ProfileOutcome {
            url: Some(url),
            links,
        }
    }

    /// Best-scoring web hit across the query variations.
    ///
    /// Every hit of a query is scored before moving on. Once the best hit so
    /// far reaches the early-stop confidence the remaining queries are
    /// skipped; otherwise the best hit overall is accepted if it reaches
    /// the acceptance confidence.
    async fn web_tier(&self, identity: &CandidateIdentity, ctx: &SearchContext) -> Option<ContactLink> {
        let mut best: Option<(f64, String)> = None;

        for query in web_queries(identity, ctx) {
            let hits = match self
                .search
                .search(&query, None, self.config.web_max_results)
                .await
            {
                Ok(hits) => hits,
                Err(SearchError::RateLimited { provider }) => {
                    warn!(candidate = %identity, %provider, "Web search rate limited, giving up on tier");
                    break;
                }
                Err(e) => {
                    warn!(candidate = %identity, error = %e, "Web search failed");
                    continue;
                }
            };

            for hit in &hits {
                let score = score_hit(hit, identity);
                let better = match &best {
                    Some((top, _)) => score > *top,
                    None => true,
                };
                if better {
                    best = Some((score, hit.url.clone()));
                }
            }

            if let Some((score, url)) = &best {
                if *score >= self.config.early_stop_confidence {
                    debug!(candidate = %identity, %url, score, "Early stop");
                    return Some(web_link(url, *score));
                }
            }
        }

        let (score, url) = best?;
        debug!(candidate = %identity, %url, score, "Best web hit");
        (score >= self.config.accept_confidence).then(|| web_link(&url, score))
    }
}

fn web_link(url: &str, score: f64) -> ContactLink {
    ContactLink::new(LinkType::CampaignSite, url, LinkSource::WebSearch, score)
}
