//! US House, US Senate and statewide executive races.

use super::{
    collect_wiki_links, humanize, into_results, run_plan, year_matches, DistrictRule,
    IndexRequest, PageTarget, RaceFamily, RaceScraper, ShapeStep, TableFilter, Take,
};
use crate::shape::TableShape;
use canvass_core::ElectionResult;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

static HOUSE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/wiki/(\d{4})_United_States_House_of_Representatives_elections?_in_(.+)$")
        .expect("valid regex")
});
static SPECIAL_HOUSE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/wiki/(\d{4})_[A-Z][\w%']+congressional_district_special_election")
        .expect("valid regex")
});
static SPECIAL_HOUSE_STATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/wiki/\d{4}_([A-Z]\w+?)(?:%27s|'s)_").expect("valid regex"));
static SENATE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/wiki/(\d{4})_United_States_Senate_election_in_(.+)$").expect("valid regex")
});
static GOVERNOR_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/wiki/(\d{4})_(\w+)_gubernatorial_election$").expect("valid regex"));
static AG_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/wiki/(\d{4})_(\w+)_[Aa]ttorney_[Gg]eneral_election$").expect("valid regex")
});

const HOUSE_PLAN: [ShapeStep; 2] = [
    ShapeStep::new(
        TableShape::Standard,
        TableFilter::GeneralElection,
        DistrictRule::Heading(&[2]),
        Take::All,
    ),
    ShapeStep::new(
        TableShape::RankedChoice,
        TableFilter::CaptionedDistrictElection,
        DistrictRule::Caption,
        Take::All,
    ),
];

// Top-two primary states publish primary and general results in one table.
const TOP_TWO_PLAN: [ShapeStep; 1] = [ShapeStep::new(
    TableShape::Combined,
    TableFilter::CaptionedDistrict,
    DistrictRule::HeadingOrCaption(&[2]),
    Take::All,
)];

const SPECIAL_HOUSE_PLAN: [ShapeStep; 2] = [
    ShapeStep::new(
        TableShape::Standard,
        TableFilter::GeneralElection,
        DistrictRule::PageTitle,
        Take::First,
    ),
    ShapeStep::new(
        TableShape::Standard,
        TableFilter::AnyWikitable,
        DistrictRule::PageTitle,
        Take::First,
    ),
];

const STATEWIDE_PLAN: [ShapeStep; 1] = [ShapeStep::new(
    TableShape::Standard,
    TableFilter::GeneralElection,
    DistrictRule::Statewide,
    Take::First,
)];

fn statewide_targets(index: &Html, year: i32, pattern: &Regex) -> Vec<PageTarget> {
    collect_wiki_links(index.root_element(), |path, _| {
        let caps = pattern.captures(path)?;
        year_matches(&caps[1], year).then(|| humanize(&caps[2]))
    })
}

/// Regular House elections: one page per state, one table per district.
#[derive(Debug, Clone, Copy, Default)]
pub struct HouseScraper;

impl RaceScraper for HouseScraper {
    fn family(&self) -> RaceFamily {
        RaceFamily::House
    }

    fn build_index(&self, year: i32) -> IndexRequest {
        IndexRequest::wiki(&format!(
            "{year}_United_States_House_of_Representatives_elections"
        ))
    }

    fn collect_targets(&self, index: &Html, year: i32) -> Vec<PageTarget> {
        statewide_targets(index, year, &HOUSE_LINK)
    }

    fn parse_page(&self, target: &PageTarget, page: &Html, year: i32) -> Vec<ElectionResult> {
        let plan: &[ShapeStep] = if target.label.eq_ignore_ascii_case("california") {
            &TOP_TWO_PLAN
        } else {
            &HOUSE_PLAN
        };
        into_results(target, &target.label, "US House", year, run_plan(page, plan))
    }
}

/// House special elections: one page per district.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecialHouseScraper;

impl RaceScraper for SpecialHouseScraper {
    fn family(&self) -> RaceFamily {
        RaceFamily::SpecialHouse
    }

    fn build_index(&self, year: i32) -> IndexRequest {
        IndexRequest::wiki(&format!(
            "{year}_United_States_House_of_Representatives_elections"
        ))
    }

    fn collect_targets(&self, index: &Html, year: i32) -> Vec<PageTarget> {
        collect_wiki_links(index.root_element(), |path, _| {
            let caps = SPECIAL_HOUSE_LINK.captures(path)?;
            if !year_matches(&caps[1], year) {
                return None;
            }
            Some(
                SPECIAL_HOUSE_STATE
                    .captures(path)
                    .map_or_else(|| "Unknown".to_string(), |s| humanize(&s[1])),
            )
        })
    }

    fn parse_page(&self, target: &PageTarget, page: &Html, year: i32) -> Vec<ElectionResult> {
        let tables = run_plan(page, &SPECIAL_HOUSE_PLAN);
        into_results(target, &target.label, "US House", year, tables)
    }
}

/// Senate elections: statewide, one page per state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SenateScraper;

impl RaceScraper for SenateScraper {
    fn family(&self) -> RaceFamily {
        RaceFamily::Senate
    }

    fn build_index(&self, year: i32) -> IndexRequest {
        IndexRequest::wiki(&format!("{year}_United_States_Senate_elections"))
    }

    fn collect_targets(&self, index: &Html, year: i32) -> Vec<PageTarget> {
        statewide_targets(index, year, &SENATE_LINK)
    }

    fn parse_page(&self, target: &PageTarget, page: &Html, year: i32) -> Vec<ElectionResult> {
        let tables = run_plan(page, &STATEWIDE_PLAN);
        into_results(target, &target.label, "US Senate", year, tables)
    }
}

/// Gubernatorial elections.
#[derive(Debug, Clone, Copy, Default)]
pub struct GovernorScraper;

impl RaceScraper for GovernorScraper {
    fn family(&self) -> RaceFamily {
        RaceFamily::Governor
    }

    fn build_index(&self, year: i32) -> IndexRequest {
        IndexRequest::wiki(&format!("{year}_United_States_gubernatorial_elections"))
    }

    fn collect_targets(&self, index: &Html, year: i32) -> Vec<PageTarget> {
        statewide_targets(index, year, &GOVERNOR_LINK)
    }

    fn parse_page(&self, target: &PageTarget, page: &Html, year: i32) -> Vec<ElectionResult> {
        let tables = run_plan(page, &STATEWIDE_PLAN);
        into_results(target, &target.label, "Governor", year, tables)
    }
}

/// Attorney general elections.
///
/// Not every year has an attorney general index; the gubernatorial index
/// links the same state pages and serves as the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttorneyGeneralScraper;

impl RaceScraper for AttorneyGeneralScraper {
    fn family(&self) -> RaceFamily {
        RaceFamily::AttorneyGeneral
    }

    fn build_index(&self, year: i32) -> IndexRequest {
        IndexRequest::wiki(&format!("{year}_United_States_attorney_general_elections"))
            .or_else_wiki(&format!("{year}_United_States_gubernatorial_elections"))
    }

    fn collect_targets(&self, index: &Html, year: i32) -> Vec<PageTarget> {
        statewide_targets(index, year, &AG_LINK)
    }

    fn parse_page(&self, target: &PageTarget, page: &Html, year: i32) -> Vec<ElectionResult> {
        let tables = run_plan(page, &STATEWIDE_PLAN);
        into_results(target, &target.label, "Attorney General", year, tables)
    }
}
