//! Index-to-page harvest of one race family.

use crate::contacts::{extract_contacts, SourceKind};
use crate::error::Result;
use crate::races::{IndexRequest, PageTarget, RaceFamily, RaceScraper};
use canvass_core::{ContactLink, ElectionResult};
use canvass_fetch::{FetchedPage, HostClass, PageSource};
use scraper::Html;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives a [`RaceScraper`] over the pages it discovers.
///
/// Documents are parsed inside synchronous scopes only; nothing parsed is
/// held across an await point.
pub struct Harvester {
    pages: Arc<dyn PageSource>,
}

impl Harvester {
    /// Harvest through `pages`.
    #[must_use]
    pub fn new(pages: Arc<dyn PageSource>) -> Self {
        Self { pages }
    }

    /// Every race of `family` in `year`.
    ///
    /// Only a missing index is an error. Result pages that fail to fetch
    /// are logged and skipped, and pages without a recognizable table
    /// contribute nothing.
    pub async fn harvest(&self, family: RaceFamily, year: i32) -> Result<Vec<ElectionResult>> {
        let scraper = family.scraper();
        let index = self.fetch_index(scraper.build_index(year)).await?;

        let targets = {
            let doc = Html::parse_document(&index.body);
            scraper.collect_targets(&doc, year)
        };
        info!(%family, year, pages = targets.len(), "Collected result pages");

        let mut results = Vec::new();
        for target in &targets {
            match self.harvest_page(scraper, target, year).await {
                Ok(found) => results.extend(found),
                Err(e) => warn!(url = %target.url, error = %e, "Skipping result page"),
            }
        }

        info!(%family, year, elections = results.len(), "Harvest complete");
        Ok(results)
    }

    async fn harvest_page(
        &self,
        scraper: &dyn RaceScraper,
        target: &PageTarget,
        year: i32,
    ) -> Result<Vec<ElectionResult>> {
        let page = self.pages.fetch(&target.url, HostClass::Wiki).await?;
        let found = {
            let doc = Html::parse_document(&page.body);
            scraper.parse_page(target, &doc, year)
        };
        if found.is_empty() {
            debug!(url = %target.url, label = %target.label, "No results table matched");
        }
        Ok(found)
    }

    async fn fetch_index(&self, request: IndexRequest) -> Result<FetchedPage> {
        match self.pages.fetch(&request.primary, HostClass::Wiki).await {
            Ok(page) => Ok(page),
            Err(e) if e.is_not_found() => {
                let Some(fallback) = request.fallback else {
                    return Err(e.into());
                };
                warn!(primary = %request.primary, %fallback, "Index not found, using fallback");
                Ok(self.pages.fetch(&fallback, HostClass::Wiki).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Campaign site from a candidate's Wikipedia article, if it lists one.
    pub async fn enrich_from_profile(&self, profile_url: &str) -> Result<Option<ContactLink>> {
        let page = self.pages.fetch(profile_url, HostClass::Wiki).await?;
        let doc = Html::parse_document(&page.body);
        Ok(extract_contacts(doc.root_element(), SourceKind::Wikipedia)
            .into_iter()
            .next())
    }
}
