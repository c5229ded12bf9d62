//! Mayoral and municipal races, discovered through a category page.

use super::{
    collect_wiki_links, into_results, run_plan, year_matches, DistrictRule, IndexRequest,
    PageTarget, RaceFamily, RaceScraper, ShapeStep, TableFilter, Take,
};
use crate::shape::TableShape;
use canvass_core::ElectionResult;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static CATEGORY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.mw-category").expect("valid selector"));
static MUNICIPAL_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^/wiki/(\d{4})_\w+_(?:mayoral_(?:election|special_election)|municipal_elections?)",
    )
    .expect("valid regex")
});
static WIKIPEDIA_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[-–]\s*Wikipedia$").expect("valid regex"));

const SKIP_TITLES: [&str; 3] = [
    "united states local elections",
    "united states mayoral elections",
    "city of starbase",
];
const TITLE_SUFFIXES: [&str; 4] = [
    " mayoral election",
    " municipal election",
    " municipal elections",
    " mayoral special election",
];

const MUNICIPAL_PLAN: [ShapeStep; 2] = [
    ShapeStep::new(
        TableShape::Standard,
        TableFilter::ResultsWithRowHeaders,
        DistrictRule::Statewide,
        Take::First,
    ),
    ShapeStep::new(
        TableShape::BasicPatternA,
        TableFilter::Results,
        DistrictRule::Statewide,
        Take::First,
    ),
];

/// City name from an article title such as `"2025 Boston mayoral election"`.
#[must_use]
pub fn city_name(title: &str, year: i32) -> String {
    let untagged = WIKIPEDIA_SUFFIX.replace(title, "");
    let prefix = format!("{year} ");
    let mut name = untagged.strip_prefix(&prefix).unwrap_or(untagged.as_ref());

    let stripped = TITLE_SUFFIXES.iter().find_map(|suffix| {
        let cut = name.len().checked_sub(suffix.len())?;
        name.get(cut..)
            .filter(|tail| tail.eq_ignore_ascii_case(suffix))
            .map(|_| &name[..cut])
    });
    if let Some(stripped) = stripped {
        name = stripped;
    }
    name.trim().to_string()
}

/// Mayoral elections listed on the year's category page.
///
/// The `state` of each result holds the city name.
#[derive(Debug, Clone, Copy, Default)]
pub struct MunicipalScraper;

impl RaceScraper for MunicipalScraper {
    fn family(&self) -> RaceFamily {
        RaceFamily::Municipal
    }

    fn build_index(&self, year: i32) -> IndexRequest {
        IndexRequest::wiki(&format!("Category:{year}_United_States_mayoral_elections"))
    }

    fn collect_targets(&self, index: &Html, year: i32) -> Vec<PageTarget> {
        let scope = index
            .select(&CATEGORY)
            .next()
            .unwrap_or_else(|| index.root_element());

        collect_wiki_links(scope, |path, text| {
            let lower = text.to_lowercase();
            if SKIP_TITLES.iter().any(|s| lower.contains(s)) {
                return None;
            }
            let linked = MUNICIPAL_LINK
                .captures(path)
                .is_some_and(|caps| year_matches(&caps[1], year));
            if !linked && !lower.contains("mayoral") && !lower.contains("municipal") {
                return None;
            }
            let city = city_name(text, year);
            (!city.is_empty()).then_some(city)
        })
    }

    fn parse_page(&self, target: &PageTarget, page: &Html, year: i32) -> Vec<ElectionResult> {
        let tables = run_plan(page, &MUNICIPAL_PLAN);
        into_results(target, &target.label, "Mayor", year, tables)
    }
}
