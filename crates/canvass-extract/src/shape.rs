//! Table-format resolution: one row schema out of five table shapes.

use crate::error::{ExtractError, Result};
use crate::normalize::{has_class, text_of, wiki_url};
use canvass_core::CandidateRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;

static INCUMBENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\(incumbent\)").expect("valid regex"));
static FOOTNOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("valid regex"));
static BOLD_STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)font-weight\s*:\s*bold").expect("valid regex"));

static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static VCARD_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr.vcard").expect("valid selector"));
static VCARD_SPAN: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.vcard").expect("valid selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").expect("valid selector"));
static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid selector"));
static TH: Lazy<Selector> = Lazy::new(|| Selector::parse("th").expect("valid selector"));
static ROW_HEADER: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"th[scope="row"]"#).expect("valid selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("valid selector"));
static BOLD: Lazy<Selector> = Lazy::new(|| Selector::parse("b").expect("valid selector"));
static STYLED: Lazy<Selector> = Lazy::new(|| Selector::parse("[style]").expect("valid selector"));

const KNOWN_PARTIES: [(&str, &str); 5] = [
    ("republican", "Republican"),
    ("democrat", "Democratic"),
    ("libertarian", "Libertarian"),
    ("green", "Green"),
    ("independent", "Independent"),
];

/// Known layouts of a candidate-results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableShape {
    /// One `tr.vcard` per candidate, party in a `.org` cell
    Standard,
    /// Primary and general results in one table, split by `<th>`-only rows
    Combined,
    /// Ranked-choice tabulation, candidate in an inline `span.vcard`
    RankedChoice,
    /// No vcard markers; candidate in a `th[scope=row]` cell
    BasicPatternA,
    /// Yes/No retention vote
    Retention,
}

impl TableShape {
    /// Stable snake-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Combined => "combined",
            Self::RankedChoice => "ranked_choice",
            Self::BasicPatternA => "basic_pattern_a",
            Self::Retention => "retention",
        }
    }
}

impl fmt::Display for TableShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-election within a [`TableShape::Combined`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    /// Primary (or runoff) rows
    Primary,
    /// General-election rows
    #[default]
    General,
}

/// Extract general-election candidate rows from `table` as `shape`.
///
/// An empty result means the table does not fit the shape.
#[must_use]
pub fn extract_rows(table: ElementRef<'_>, shape: TableShape) -> Vec<CandidateRecord> {
    extract_rows_in(table, shape, Section::General)
}

/// Extract rows, choosing the sub-election for combined tables.
#[must_use]
pub fn extract_rows_in(
    table: ElementRef<'_>,
    shape: TableShape,
    section: Section,
) -> Vec<CandidateRecord> {
    match shape {
        TableShape::Standard => table.select(&VCARD_ROW).filter_map(parse_vcard_row).collect(),
        TableShape::Combined => combined_rows(table, section),
        TableShape::RankedChoice => table.select(&ROW).filter_map(parse_ranked_choice_row).collect(),
        TableShape::BasicPatternA => table.select(&ROW).filter_map(parse_scoped_row).collect(),
        TableShape::Retention => retention_rows(table),
    }
}

/// Guess the shape of a table from its structural markers.
pub fn classify_table(table: ElementRef<'_>) -> Result<TableShape> {
    if table.select(&ROW).any(|row| section_marker(row).is_some())
        && table.select(&VCARD_ROW).next().is_some()
    {
        return Ok(TableShape::Combined);
    }
    if table.select(&VCARD_ROW).next().is_some() {
        return Ok(TableShape::Standard);
    }
    if table.select(&VCARD_SPAN).next().is_some() {
        return Ok(TableShape::RankedChoice);
    }
    if !retention_rows(table).is_empty() {
        return Ok(TableShape::Retention);
    }
    if table.select(&ROW_HEADER).next().is_some() {
        return Ok(TableShape::BasicPatternA);
    }
    Err(ExtractError::ShapeUnrecognized {
        detail: "no vcard rows, row-scope headers or Yes/No rows".to_string(),
    })
}

/// Standard `tr.vcard` row.
///
/// The party cell is found by its `org` class and the name by `fn` (or the
/// cell after the party), never by column position: incumbency and
/// write-in columns shift positions between otherwise identical tables.
fn parse_vcard_row(row: ElementRef<'_>) -> Option<CandidateRecord> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    if cells.len() < 4 {
        return None;
    }

    let (party_cell, name_cell, pct_idx) = match cells.iter().position(|c| has_class(*c, "org")) {
        Some(i) => {
            let spans = cells[i]
                .value()
                .attr("colspan")
                .and_then(|c| c.trim().parse::<usize>().ok())
                .unwrap_or(1);
            let fn_cell = cells.iter().copied().find(|c| has_class(*c, "fn"));
            if spans >= 2 {
                (cells[i], fn_cell, i + 2)
            } else {
                let name_cell = fn_cell.or_else(|| cells.get(i + 1).copied());
                (cells[i], name_cell, i + 3)
            }
        }
        None if cells.len() >= 5 => (cells[1], Some(cells[2]), 4),
        None => return None,
    };

    let name_cell = name_cell?;
    let name = clean_name(&text_of(name_cell));
    if name.is_empty() {
        return None;
    }

    let is_winner = name_cell.select(&BOLD).next().is_some() || has_bold_style(row);
    Some(CandidateRecord {
        party: clean_name(&text_of(party_cell)),
        name,
        profile_url: profile_link(name_cell),
        vote_pct: cells.get(pct_idx).and_then(|c| parse_pct(&text_of(*c))),
        is_winner,
    })
}

fn combined_rows(table: ElementRef<'_>, wanted: Section) -> Vec<CandidateRecord> {
    let mut current = Section::Primary;
    let mut records = Vec::new();

    for row in table.select(&ROW) {
        if let Some(section) = section_marker(row) {
            if section == Section::General && wanted == Section::General {
                // Only the last general block counts.
                records.clear();
            }
            current = section;
            continue;
        }
        if current == wanted && has_class(row, "vcard") {
            records.extend(parse_vcard_row(row));
        }
    }
    records
}

/// A `<th>`-only row announcing a sub-election.
fn section_marker(row: ElementRef<'_>) -> Option<Section> {
    if row.select(&TD).next().is_some() {
        return None;
    }
    let headers: Vec<ElementRef<'_>> = row.select(&TH).collect();
    let header = headers.first()?;
    let spans = header
        .value()
        .attr("colspan")
        .and_then(|c| c.trim().parse::<usize>().ok())
        .unwrap_or(1);
    if headers.len() > 1 && spans < 3 {
        return None;
    }

    let text = text_of(*header).to_lowercase();
    if text.contains("general election") {
        Some(Section::General)
    } else if text.contains("primary") || text.contains("runoff") {
        Some(Section::Primary)
    } else {
        None
    }
}

fn parse_ranked_choice_row(row: ElementRef<'_>) -> Option<CandidateRecord> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    if cells.len() < 4 {
        return None;
    }
    let marker = row.select(&VCARD_SPAN).next()?;

    let party = cells
        .iter()
        .filter_map(|c| c.select(&LINK).next())
        .find_map(|link| {
            let text = text_of(link).to_lowercase();
            KNOWN_PARTIES
                .iter()
                .find(|(needle, _)| text.contains(needle))
                .map(|(_, label)| (*label).to_string())
        })
        .unwrap_or_default();

    let name = clean_name(&text_of(marker));
    if name.is_empty() {
        return None;
    }

    // Later rounds sit further right; the final tabulation is the last
    // percentage column.
    let final_round = cells.iter().rev().find(|c| text_of(**c).contains('%'));
    Some(CandidateRecord {
        party,
        name,
        profile_url: profile_link(marker),
        vote_pct: final_round.and_then(|c| parse_pct(&text_of(*c))),
        is_winner: final_round.is_some_and(|c| c.select(&BOLD).next().is_some()),
    })
}

fn parse_scoped_row(row: ElementRef<'_>) -> Option<CandidateRecord> {
    let header = row.select(&ROW_HEADER).next()?;
    let name = clean_name(&text_of(header));
    if name.is_empty() {
        return None;
    }

    let vote_pct = row
        .select(&TD)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .find_map(|td| parse_pct(&text_of(td)).filter(|v| (0.0..=100.0).contains(v)));

    Some(CandidateRecord {
        party: String::new(),
        name,
        profile_url: profile_link(header),
        vote_pct,
        is_winner: header.select(&BOLD).next().is_some() || has_bold_style(row),
    })
}

/// At most one "Yes" and one "No" record.
fn retention_rows(table: ElementRef<'_>) -> Vec<CandidateRecord> {
    let mut records: Vec<CandidateRecord> = Vec::with_capacity(2);

    for row in table.select(&ROW) {
        let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
        let Some(label) = cells.iter().find_map(|c| vote_label(&text_of(*c))) else {
            continue;
        };
        if records.iter().any(|r| r.name == label) {
            continue;
        }

        let vote_pct = cells
            .iter()
            .map(|c| text_of(*c))
            .filter(|t| t.contains('%'))
            .find_map(|t| parse_pct(&t));
        records.push(CandidateRecord {
            party: String::new(),
            name: label.to_string(),
            profile_url: None,
            vote_pct,
            is_winner: vote_pct.is_some_and(|p| p > 50.0),
        });
    }
    records
}

fn vote_label(text: &str) -> Option<&'static str> {
    let word: String = text
        .chars()
        .skip_while(|c| !c.is_alphabetic())
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();
    match word.as_str() {
        "yes" => Some("Yes"),
        "no" => Some("No"),
        _ => None,
    }
}

fn profile_link(cell: ElementRef<'_>) -> Option<String> {
    cell.select(&LINK)
        .filter_map(|a| a.value().attr("href"))
        .find_map(wiki_url)
}

fn has_bold_style(row: ElementRef<'_>) -> bool {
    row.value().attr("style").is_some_and(|s| BOLD_STYLE_RE.is_match(s))
        || row
            .select(&STYLED)
            .filter_map(|e| e.value().attr("style"))
            .any(|s| BOLD_STYLE_RE.is_match(s))
}

fn clean_name(raw: &str) -> String {
    let without_incumbent = INCUMBENT_RE.replace_all(raw, "");
    FOOTNOTE_RE
        .replace_all(&without_incumbent, "")
        .trim()
        .to_string()
}

/// Parse `"55.2%"` or `"1,234"`-style cells.
fn parse_pct(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != ',' && *c != '%').collect();
    cleaned.trim().parse::<f64>().ok()
}
