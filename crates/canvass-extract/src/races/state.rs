//! State legislative and state supreme court races.

use super::{
    collect_wiki_links, humanize, into_results, run_plan, year_matches, DistrictRule,
    IndexRequest, PageTarget, RaceFamily, RaceScraper, ShapeStep, TableFilter, Take,
};
use crate::normalize::page_title;
use crate::shape::TableShape;
use canvass_core::ElectionResult;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

static LEGISLATIVE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^/wiki/(\d{4})_(\w+?)_(?:House_of_Delegates|General_Assembly|House_of_Representatives|State_Senate|State_Assembly|Assembly)_election",
    )
    .expect("valid regex")
});
static LEGISLATIVE_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}\s+(.+?)\s+(?:House|General|State|Assembly|Senate)").expect("valid regex")
});
static SPECIAL_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/wiki/(\d{4})_(.+)special_election").expect("valid regex"));
static SUPREME_COURT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/wiki/(\d{4})_(\w+)_Supreme_Court_election").expect("valid regex"));

/// Special-election pages for other offices share the URL pattern.
const NOT_LEGISLATIVE: [&str; 5] = [
    "congressional_district",
    "gubernatorial",
    "attorney_general",
    "supreme_court",
    "mayoral",
];
const CHAMBER_WORDS: [&str; 5] = ["house", "senate", "assembly", "delegates", "representatives"];
/// Longest first, so `House_of_Representatives` wins over `House`.
const CHAMBER_SEGMENTS: [&str; 7] = [
    "House_of_Representatives",
    "House_of_Delegates",
    "General_Assembly",
    "State_Senate",
    "Senate",
    "Assembly",
    "House",
];

const LEGISLATIVE_PLAN: [ShapeStep; 2] = [
    ShapeStep::new(
        TableShape::Standard,
        TableFilter::GeneralElection,
        DistrictRule::Heading(&[2, 3]),
        Take::All,
    ),
    ShapeStep::new(
        TableShape::Standard,
        TableFilter::DistrictHeading,
        DistrictRule::NearestHeading(&[2, 3]),
        Take::All,
    ),
];

const SPECIAL_PLAN: [ShapeStep; 2] = [
    ShapeStep::new(
        TableShape::Standard,
        TableFilter::GeneralElection,
        DistrictRule::PageTitle,
        Take::All,
    ),
    ShapeStep::new(
        TableShape::Standard,
        TableFilter::AnyWikitable,
        DistrictRule::PageTitle,
        Take::All,
    ),
];

const JUDICIAL_PLAN: [ShapeStep; 4] = [
    ShapeStep::new(
        TableShape::Standard,
        TableFilter::GeneralElection,
        DistrictRule::Statewide,
        Take::All,
    ),
    ShapeStep::new(
        TableShape::Standard,
        TableFilter::AnyWikitable,
        DistrictRule::Statewide,
        Take::All,
    ),
    ShapeStep::new(
        TableShape::BasicPatternA,
        TableFilter::CaptionedElection,
        DistrictRule::Statewide,
        Take::All,
    ),
    ShapeStep::new(
        TableShape::Retention,
        TableFilter::RetentionVote,
        DistrictRule::Statewide,
        Take::All,
    ),
];

/// `"State Senate"` for upper chambers, otherwise `"State House"`.
fn chamber_race_type(text: &str) -> &'static str {
    if text.to_lowercase().contains("senate") {
        "State Senate"
    } else {
        "State House"
    }
}

/// Title when present, else the page URL.
fn chamber_source<'a>(title: &'a str, target: &'a PageTarget) -> &'a str {
    if title.is_empty() {
        &target.url
    } else {
        title
    }
}

/// Regular legislative elections: one page per chamber.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateLegislativeScraper;

impl RaceScraper for StateLegislativeScraper {
    fn family(&self) -> RaceFamily {
        RaceFamily::StateLegislative
    }

    fn build_index(&self, year: i32) -> IndexRequest {
        IndexRequest::wiki(&format!("{year}_United_States_state_legislative_elections"))
    }

    fn collect_targets(&self, index: &Html, year: i32) -> Vec<PageTarget> {
        collect_wiki_links(index.root_element(), |path, _| {
            if path.to_lowercase().contains("special") || path.contains("United_States") {
                return None;
            }
            let caps = LEGISLATIVE_LINK.captures(path)?;
            year_matches(&caps[1], year).then(|| humanize(&caps[2]))
        })
    }

    fn parse_page(&self, target: &PageTarget, page: &Html, year: i32) -> Vec<ElectionResult> {
        let title = page_title(page.root_element());
        let race_type = chamber_race_type(chamber_source(&title, target));
        let state = LEGISLATIVE_TITLE
            .captures(&title)
            .map_or_else(|| target.label.clone(), |c| c[1].trim().to_string());

        let tables = run_plan(page, &LEGISLATIVE_PLAN);
        into_results(target, &state, race_type, year, tables)
    }
}

/// Legislative special elections: one page per seat.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateLegislativeSpecialScraper;

impl RaceScraper for StateLegislativeSpecialScraper {
    fn family(&self) -> RaceFamily {
        RaceFamily::StateLegislativeSpecial
    }

    fn build_index(&self, year: i32) -> IndexRequest {
        IndexRequest::wiki(&format!("{year}_United_States_state_legislative_elections"))
    }

    fn collect_targets(&self, index: &Html, year: i32) -> Vec<PageTarget> {
        collect_wiki_links(index.root_element(), |path, _| {
            let caps = SPECIAL_LINK.captures(path)?;
            if !year_matches(&caps[1], year) {
                return None;
            }
            let lower = path.to_lowercase();
            if NOT_LEGISLATIVE.iter().any(|s| lower.contains(s))
                || !CHAMBER_WORDS.iter().any(|w| lower.contains(w))
            {
                return None;
            }
            Some(special_state(&caps[2]))
        })
    }

    fn parse_page(&self, target: &PageTarget, page: &Html, year: i32) -> Vec<ElectionResult> {
        let title = page_title(page.root_element());
        let race_type = chamber_race_type(chamber_source(&title, target));
        let tables = run_plan(page, &SPECIAL_PLAN);
        into_results(target, &target.label, race_type, year, tables)
    }
}

/// State name: the page name up to its first chamber segment.
fn special_state(page: &str) -> String {
    CHAMBER_SEGMENTS
        .iter()
        .find_map(|seg| page.split_once(&format!("_{seg}")).map(|(state, _)| state))
        .map_or_else(
            || humanize(page.split('_').next().unwrap_or_default()),
            humanize,
        )
}

/// State supreme court elections, contested or retention.
#[derive(Debug, Clone, Copy, Default)]
pub struct JudicialScraper;

impl RaceScraper for JudicialScraper {
    fn family(&self) -> RaceFamily {
        RaceFamily::Judicial
    }

    fn build_index(&self, year: i32) -> IndexRequest {
        IndexRequest::wiki(&format!("{year}_United_States_judicial_elections"))
    }

    fn collect_targets(&self, index: &Html, year: i32) -> Vec<PageTarget> {
        collect_wiki_links(index.root_element(), |path, _| {
            let caps = SUPREME_COURT_LINK.captures(path)?;
            year_matches(&caps[1], year).then(|| humanize(&caps[2]))
        })
    }

    fn parse_page(&self, target: &PageTarget, page: &Html, year: i32) -> Vec<ElectionResult> {
        let tables = run_plan(page, &JUDICIAL_PLAN);
        into_results(target, &target.label, "State Supreme Court", year, tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(label: &str) -> PageTarget {
        PageTarget {
            label: label.to_string(),
            url: format!("https://en.wikipedia.org/wiki/{label}"),
        }
    }

    #[test]
    fn test_legislative_targets() {
        let index = Html::parse_document(
            r#"<body>
              <a href="/wiki/2025_Virginia_House_of_Delegates_election">VA</a>
              <a href="/wiki/2025_New_Jersey_General_Assembly_election">NJ</a>
              <a href="/wiki/2025_Texas_State_Senate_election">TX</a>
              <a href="/wiki/2025_Virginia_House_of_Delegates_special_election">special</a>
              <a href="/wiki/2025_United_States_House_of_Representatives_elections">federal</a>
              <a href="/wiki/2023_Virginia_House_of_Delegates_election">old</a>
            </body>"#,
        );
        let labels: Vec<String> = StateLegislativeScraper
            .collect_targets(&index, 2025)
            .into_iter()
            .map(|t| t.label)
            .collect();
        assert_eq!(labels, ["Virginia", "New Jersey", "Texas"]);
    }

    #[test]
    fn test_special_targets_exclude_other_offices() {
        let index = Html::parse_document(
            r#"<body>
              <a href="/wiki/2025_Georgia_House_of_Representatives_District_121_special_election">GA</a>
              <a href="/wiki/2025_Minnesota_Senate_District_60_special_election">MN</a>
              <a href="/wiki/2025_Florida%27s_1st_congressional_district_special_election">FL-1</a>
              <a href="/wiki/2025_Boston_mayoral_special_election">Boston</a>
              <a href="/wiki/2025_Arizona_special_election">no chamber</a>
            </body>"#,
        );
        let targets = StateLegislativeSpecialScraper.collect_targets(&index, 2025);
        let labels: Vec<&str> = targets.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, ["Georgia", "Minnesota"]);
    }

    #[test]
    fn test_legislative_page_state_and_chamber_from_title() {
        let page = Html::parse_document(
            r#"<html><head><title>2024 Michigan Senate election - Wikipedia</title></head><body>
              <h2>District 7</h2>
              <table class="wikitable plainrowheaders"><caption>2024 general election</caption>
                <tr class="vcard"><td></td><td class="org">Democratic</td><td class="fn"><b>Jeremy Moss</b></td><td>1</td><td>61.0</td></tr>
              </table>
              <h3>Results</h3>
              <table class="wikitable plainrowheaders"><caption>2024 general election</caption>
                <tr class="vcard"><td></td><td class="org">Republican</td><td class="fn">Pat Roe</td><td>1</td><td>40.0</td></tr>
              </table>
            </body></html>"#,
        );
        let results = StateLegislativeScraper.parse_page(&target("Michigan_x"), &page, 2024);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].election.state, "Michigan");
        assert_eq!(results[0].election.race_type, "State Senate");
        assert_eq!(results[0].election.district.as_deref(), Some("7"));
        // h2 outranks the nearer h3.
        assert_eq!(results[1].election.district.as_deref(), Some("7"));
    }

    #[test]
    fn test_legislative_falls_back_to_district_headings() {
        let page = Html::parse_document(
            r#"<html><head><title>2025 Virginia House of Delegates election</title></head><body>
              <h3>District 12</h3>
              <table class="wikitable"><tr class="vcard"><td></td><td class="org">Democratic</td><td class="fn">Chris Obenshain</td><td>1</td><td>51.2</td></tr></table>
              <h3>Campaign finance</h3>
              <table class="wikitable"><tr class="vcard"><td></td><td class="org">Republican</td><td class="fn">Donor</td><td>1</td><td>2</td></tr></table>
            </body></html>"#,
        );
        let results = StateLegislativeScraper.parse_page(&target("Virginia"), &page, 2025);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].election.race_type, "State House");
        assert_eq!(results[0].election.state, "Virginia");
        assert_eq!(results[0].election.district.as_deref(), Some("12"));
    }

    #[test]
    fn test_special_page_district_from_title() {
        let page = Html::parse_document(
            r#"<html><head><title>2025 Minnesota Senate District 60 special election</title></head><body>
              <table class="wikitable"><tr class="vcard"><td></td><td class="org">DFL</td><td class="fn"><b>Doron Clark</b></td><td>1</td><td>85.0</td></tr></table>
            </body></html>"#,
        );
        let results = StateLegislativeSpecialScraper.parse_page(&target("Minnesota"), &page, 2025);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].election.race_type, "State Senate");
        assert_eq!(results[0].election.district.as_deref(), Some("60"));
    }

    #[test]
    fn test_judicial_retention_fallback() {
        let page = Html::parse_document(
            r#"<body>
              <table class="wikitable"><caption>Retention of Justice Roe</caption>
                <tr><th>Choice</th><th>Votes</th><th>%</th></tr>
                <tr><td><b>Yes</b></td><td>600,000</td><td>60.0%</td></tr>
                <tr><td>No</td><td>400,000</td><td>40.0%</td></tr>
              </table>
            </body>"#,
        );
        let results = JudicialScraper.parse_page(&target("Kansas"), &page, 2024);
        assert_eq!(results.len(), 1);
        let names: Vec<&str> = results[0].candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Yes", "No"]);
        assert!(results[0].candidates[0].is_winner);
        assert_eq!(results[0].election.race_type, "State Supreme Court");
        assert!(results[0].election.district.is_none());
    }

    #[test]
    fn test_judicial_targets() {
        let index = Html::parse_document(
            r#"<body><a href="/wiki/2025_Wisconsin_Supreme_Court_election">WI</a></body>"#,
        );
        let targets = JudicialScraper.collect_targets(&index, 2025);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].label, "Wisconsin");
    }

    #[test]
    fn test_special_state_fallbacks() {
        assert_eq!(
            special_state("New_Hampshire_House_of_Representatives_Strafford_12_"),
            "New Hampshire"
        );
        assert_eq!(special_state("Delaware_"), "Delaware");
    }
}
