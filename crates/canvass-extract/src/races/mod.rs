//! Race families and their page scrapers.
//!
//! Each [`RaceFamily`] has one [`RaceScraper`] implementation that knows
//! where the family's index page lives, which links on it lead to result
//! pages, and which ordered list of table shapes to try on those pages.

mod federal;
mod municipal;
mod state;

pub use federal::{
    AttorneyGeneralScraper, GovernorScraper, HouseScraper, SenateScraper, SpecialHouseScraper,
};
pub use municipal::MunicipalScraper;
pub use state::{JudicialScraper, StateLegislativeScraper, StateLegislativeSpecialScraper};

use crate::error::ExtractError;
use crate::normalize::{
    caption_text, extract_district, has_class, is_general_election_table, page_title,
    preceding_heading, preceding_heading_by_priority, text_of, WIKI_BASE,
};
use crate::shape::{extract_rows, TableShape};
use canvass_core::{CandidateRecord, Election, ElectionResult};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

static WIKITABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.wikitable").expect("valid selector"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));
static HEADER_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th").expect("valid selector"));

/// Closed set of supported race families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceFamily {
    /// Regular US House elections, one page per state
    House,
    /// US House special elections, one page per district
    SpecialHouse,
    /// US Senate elections
    Senate,
    /// Gubernatorial elections
    Governor,
    /// State attorney general elections
    AttorneyGeneral,
    /// Regular state legislative elections, one page per chamber
    StateLegislative,
    /// State legislative special elections
    StateLegislativeSpecial,
    /// State supreme court elections, contested or retention
    Judicial,
    /// Mayoral and municipal elections
    Municipal,
}

impl RaceFamily {
    /// Every family, in harvest order.
    pub const ALL: [Self; 9] = [
        Self::House,
        Self::SpecialHouse,
        Self::Senate,
        Self::Governor,
        Self::AttorneyGeneral,
        Self::StateLegislative,
        Self::StateLegislativeSpecial,
        Self::Judicial,
        Self::Municipal,
    ];

    /// Short lookup key.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::House => "house",
            Self::SpecialHouse => "special_house",
            Self::Senate => "senate",
            Self::Governor => "governor",
            Self::AttorneyGeneral => "attorney_general",
            Self::StateLegislative => "state_leg",
            Self::StateLegislativeSpecial => "state_leg_special",
            Self::Judicial => "judicial",
            Self::Municipal => "municipal",
        }
    }

    /// Look a family up by its short key.
    pub fn from_key(key: &str) -> Result<Self, ExtractError> {
        Self::ALL
            .into_iter()
            .find(|f| f.key() == key.trim())
            .ok_or_else(|| ExtractError::UnknownRaceFamily(key.to_string()))
    }

    /// Race keyword used in search queries for this family's candidates.
    #[must_use]
    pub fn search_keyword(&self) -> &'static str {
        match self {
            Self::House | Self::SpecialHouse => "congress",
            Self::Senate => "senate",
            Self::Governor => "governor",
            _ => "election",
        }
    }

    /// The scraper implementing this family.
    #[must_use]
    pub fn scraper(&self) -> &'static dyn RaceScraper {
        match self {
            Self::House => &HouseScraper,
            Self::SpecialHouse => &SpecialHouseScraper,
            Self::Senate => &SenateScraper,
            Self::Governor => &GovernorScraper,
            Self::AttorneyGeneral => &AttorneyGeneralScraper,
            Self::StateLegislative => &StateLegislativeScraper,
            Self::StateLegislativeSpecial => &StateLegislativeSpecialScraper,
            Self::Judicial => &JudicialScraper,
            Self::Municipal => &MunicipalScraper,
        }
    }
}

impl fmt::Display for RaceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RaceFamily {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s)
    }
}

/// Where a family's index page lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRequest {
    /// Index page to try first
    pub primary: String,
    /// Substitute index when the primary does not exist
    pub fallback: Option<String>,
}

impl IndexRequest {
    fn wiki(page: &str) -> Self {
        Self {
            primary: format!("{WIKI_BASE}/wiki/{page}"),
            fallback: None,
        }
    }

    fn or_else_wiki(mut self, page: &str) -> Self {
        self.fallback = Some(format!("{WIKI_BASE}/wiki/{page}"));
        self
    }
}

/// A result page discovered on an index page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageTarget {
    /// State, state and chamber, or city the page covers
    pub label: String,
    /// Absolute page URL
    pub url: String,
}

/// One family's way of turning index and result pages into records.
pub trait RaceScraper: Send + Sync {
    /// Family this scraper implements.
    fn family(&self) -> RaceFamily;

    /// Index page for `year`.
    fn build_index(&self, year: i32) -> IndexRequest;

    /// Result pages linked from the index, de-duplicated, in page order.
    fn collect_targets(&self, index: &Html, year: i32) -> Vec<PageTarget>;

    /// Races found on one result page. Empty when nothing matched.
    fn parse_page(&self, target: &PageTarget, page: &Html, year: i32) -> Vec<ElectionResult>;
}

/// Which tables a shape step considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFilter {
    /// `plainrowheaders` tables reporting a general election
    GeneralElection,
    /// Every wikitable
    AnyWikitable,
    /// Tables captioned with a congressional district or at-large seat
    CaptionedDistrict,
    /// Sortable tables captioned as a district election
    CaptionedDistrictElection,
    /// Tables sitting under a heading that names a district
    DistrictHeading,
    /// Tables captioned as an election
    CaptionedElection,
    /// Tables mentioning a retention or Yes/No vote
    RetentionVote,
    /// `plainrowheaders` tables whose headers mention votes or `%`
    ResultsWithRowHeaders,
    /// Tables whose headers mention votes or `%`
    Results,
}

impl TableFilter {
    /// Whether `table` (a `table.wikitable`) passes the filter.
    #[must_use]
    pub fn matches(self, table: ElementRef<'_>) -> bool {
        match self {
            Self::GeneralElection => {
                has_class(table, "plainrowheaders") && is_general_election_table(table)
            }
            Self::AnyWikitable => true,
            Self::CaptionedDistrict => caption_text(table).is_some_and(|c| names_district(&c)),
            Self::CaptionedDistrictElection => {
                has_class(table, "sortable")
                    && caption_text(table)
                        .is_some_and(|c| c.contains("election") && names_district(&c))
            }
            Self::DistrictHeading => preceding_heading(table, &[2, 3])
                .is_some_and(|h| h.text().to_lowercase().contains("district")),
            Self::CaptionedElection => caption_text(table).is_some_and(|c| c.contains("election")),
            Self::RetentionVote => {
                let text = text_of(table).to_lowercase();
                text.contains("retention") || text.contains("yes")
            }
            Self::ResultsWithRowHeaders => {
                has_class(table, "plainrowheaders") && is_results_table(table)
            }
            Self::Results => is_results_table(table),
        }
    }
}

fn names_district(caption: &str) -> bool {
    caption.contains("congressional district") || caption.contains("at-large")
}

fn is_results_table(table: ElementRef<'_>) -> bool {
    let headers = table
        .select(&HEADER_CELL)
        .map(|th| text_of(th).to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    headers.contains("votes") || headers.contains('%')
}

/// How a matched table is attributed to a district.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistrictRule {
    /// Statewide race, no district
    Statewide,
    /// Nearest heading, each level tried on its own in order
    Heading(&'static [u8]),
    /// Nearest heading of any of the levels
    NearestHeading(&'static [u8]),
    /// Nearest heading, else the table caption
    HeadingOrCaption(&'static [u8]),
    /// Table caption
    Caption,
    /// Document title
    PageTitle,
}

impl DistrictRule {
    fn resolve(self, table: ElementRef<'_>, title: &str) -> Option<String> {
        let text = match self {
            Self::Statewide => return None,
            Self::Heading(levels) => preceding_heading_by_priority(table, levels)
                .map(|h| h.text())
                .unwrap_or_default(),
            Self::NearestHeading(levels) => preceding_heading(table, levels)
                .map(|h| h.text())
                .unwrap_or_default(),
            Self::HeadingOrCaption(levels) => preceding_heading_by_priority(table, levels)
                .map(|h| h.text())
                .or_else(|| caption_text(table))
                .unwrap_or_default(),
            Self::Caption => caption_text(table).unwrap_or_default(),
            Self::PageTitle => title.to_string(),
        };
        Some(extract_district(&text))
    }
}

/// How many matching tables a step may contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Take {
    /// Stop at the first table that yields rows
    First,
    /// Every table that yields rows
    All,
}

/// One entry of a family's ordered shape plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeStep {
    /// Row extraction rules
    pub shape: TableShape,
    /// Tables the step looks at
    pub tables: TableFilter,
    /// District attribution for matched tables
    pub district: DistrictRule,
    /// Table limit
    pub take: Take,
}

impl ShapeStep {
    const fn new(shape: TableShape, tables: TableFilter, district: DistrictRule, take: Take) -> Self {
        Self {
            shape,
            tables,
            district,
            take,
        }
    }
}

/// Rows extracted from one table by a shape plan.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRows {
    /// Shape that produced the rows
    pub shape: TableShape,
    /// District attributed to the table
    pub district: Option<String>,
    /// Extracted candidates
    pub candidates: Vec<CandidateRecord>,
}

/// Apply `plan` to a page.
///
/// Steps are tried in order and the first step yielding any rows wins;
/// later steps never run and results are never mixed across steps.
#[must_use]
pub fn run_plan(page: &Html, plan: &[ShapeStep]) -> Vec<TableRows> {
    let scope = page.root_element();
    let title = page_title(scope);

    for step in plan {
        let mut found = Vec::new();
        for table in scope.select(&WIKITABLE).filter(|t| step.tables.matches(*t)) {
            let candidates = extract_rows(table, step.shape);
            if candidates.is_empty() {
                continue;
            }
            found.push(TableRows {
                shape: step.shape,
                district: step.district.resolve(table, &title),
                candidates,
            });
            if step.take == Take::First {
                break;
            }
        }

        if !found.is_empty() {
            debug!(shape = %step.shape, tables = found.len(), "Shape plan matched");
            return found;
        }
    }
    Vec::new()
}

/// Wrap plan output as election results for `target`.
fn into_results(
    target: &PageTarget,
    state: &str,
    race_type: &str,
    year: i32,
    tables: Vec<TableRows>,
) -> Vec<ElectionResult> {
    tables
        .into_iter()
        .map(|t| ElectionResult {
            election: Election {
                state: state.to_string(),
                race_type: race_type.to_string(),
                year,
                district: t.district,
                source_url: target.url.clone(),
            },
            candidates: t.candidates,
        })
        .collect()
}

/// Collect `/wiki/` links accepted by `label_for`, de-duplicated by path.
///
/// `label_for` receives the fragment-free path and the anchor text and
/// returns the target label, or `None` to skip the link.
fn collect_wiki_links<F>(scope: ElementRef<'_>, mut label_for: F) -> Vec<PageTarget>
where
    F: FnMut(&str, &str) -> Option<String>,
{
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for anchor in scope.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let path = href.split('#').next().unwrap_or_default();
        if !path.starts_with("/wiki/") || seen.contains(path) {
            continue;
        }
        if let Some(label) = label_for(path, &text_of(anchor)) {
            seen.insert(path.to_string());
            targets.push(PageTarget {
                label,
                url: format!("{WIKI_BASE}{path}"),
            });
        }
    }
    targets
}

/// Human-readable name from a URL path segment.
fn humanize(segment: &str) -> String {
    segment.replace("%27", "'").replace('_', " ").trim().to_string()
}

fn year_matches(captured: &str, year: i32) -> bool {
    captured.parse::<i32>().is_ok_and(|y| y == year)
}
