//! Structural anchors in wiki markup: headings, captions and the district
//! a results table belongs to.
//!
//! MediaWiki renders a section heading either as a bare `<hN>` or wrapped in
//! `<div class="mw-heading mw-headingN">`. Every lookup here treats both
//! forms identically.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

/// Base for site-relative `/wiki/` links.
pub const WIKI_BASE: &str = "https://en.wikipedia.org";

/// District label used for at-large seats and unattributable tables.
pub const AT_LARGE: &str = "At-Large";

static AT_LARGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)at.large").expect("valid regex"));
static ORDINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(?:st|nd|rd|th)").expect("valid regex"));
static DISTRICT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[Dd]istrict\s+(\d+)").expect("valid regex"));
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("valid regex"));
static EDIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\[\s*edit\s*\]").expect("valid regex"));

static CAPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("caption").expect("valid selector"));
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));
static HEADINGS: [Lazy<Selector>; 6] = [
    Lazy::new(|| Selector::parse("h1").expect("valid selector")),
    Lazy::new(|| Selector::parse("h2").expect("valid selector")),
    Lazy::new(|| Selector::parse("h3").expect("valid selector")),
    Lazy::new(|| Selector::parse("h4").expect("valid selector")),
    Lazy::new(|| Selector::parse("h5").expect("valid selector")),
    Lazy::new(|| Selector::parse("h6").expect("valid selector")),
];

/// A located section heading.
#[derive(Debug, Clone, Copy)]
pub struct HeadingNode<'a> {
    /// The `<hN>` element itself
    pub element: ElementRef<'a>,
    /// The outermost node of the heading: the `mw-heading` wrapper if
    /// present, otherwise `element`. Sibling walks start from here.
    pub container: ElementRef<'a>,
    /// Heading level, 1 through 6
    pub level: u8,
}

impl<'a> HeadingNode<'a> {
    fn from_element(element: ElementRef<'a>, level: u8) -> Self {
        let container = element
            .parent()
            .and_then(ElementRef::wrap)
            .filter(|p| is_heading_wrapper(*p))
            .unwrap_or(element);
        Self {
            element,
            container,
            level,
        }
    }

    /// Heading text without `[edit]` links.
    #[must_use]
    pub fn text(&self) -> String {
        let raw = text_of(self.element);
        EDIT_RE.replace_all(&raw, "").trim().to_string()
    }
}

/// Whitespace-collapsed text content of an element.
#[must_use]
pub fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `element` carries CSS class `class`.
#[must_use]
pub fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// Heading level of a bare `<hN>` element.
#[must_use]
pub fn heading_level(element: ElementRef<'_>) -> Option<u8> {
    match element.value().name() {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn is_heading_wrapper(element: ElementRef<'_>) -> bool {
    element.value().name() == "div" && has_class(element, "mw-heading")
}

/// Interpret `element` as a heading of one of `levels`, looking one level
/// inside `mw-heading` wrappers.
fn as_heading<'a>(element: ElementRef<'a>, levels: &[u8]) -> Option<HeadingNode<'a>> {
    if let Some(level) = heading_level(element) {
        return levels.contains(&level).then(|| HeadingNode {
            element,
            container: element,
            level,
        });
    }

    if is_heading_wrapper(element) {
        return element.children().filter_map(ElementRef::wrap).find_map(|child| {
            let level = heading_level(child)?;
            levels.contains(&level).then_some(HeadingNode {
                element: child,
                container: element,
                level,
            })
        });
    }
    None
}

/// First heading under `scope` whose text contains any of `patterns`
/// (case-insensitive).
///
/// Levels are searched one at a time in the order given, each to
/// exhaustion, so a match at an earlier level always beats one at a later
/// level regardless of document position.
#[must_use]
pub fn find_heading<'a>(
    scope: ElementRef<'a>,
    patterns: &[&str],
    levels: &[u8],
) -> Option<HeadingNode<'a>> {
    let patterns: Vec<String> = patterns.iter().map(|p| p.to_lowercase()).collect();

    levels.iter().find_map(|&level| {
        let selector = HEADINGS.get(usize::from(level).checked_sub(1)?)?;
        scope.select(selector).find_map(|element| {
            let heading = HeadingNode::from_element(element, level);
            let text = heading.text().to_lowercase();
            patterns
                .iter()
                .any(|p| text.contains(p.as_str()))
                .then_some(heading)
        })
    })
}

/// Nearest heading of any of `levels` above `node`.
///
/// Walks previous siblings first, then repeats from each ancestor, so a
/// table nested in a layout `<div>` still finds its section heading.
#[must_use]
pub fn preceding_heading<'a>(node: ElementRef<'a>, levels: &[u8]) -> Option<HeadingNode<'a>> {
    let mut current = node;
    loop {
        for sibling in current.prev_siblings().filter_map(ElementRef::wrap) {
            if let Some(heading) = as_heading(sibling, levels) {
                return Some(heading);
            }
        }
        current = current.parent().and_then(ElementRef::wrap)?;
    }
}

/// Like [`preceding_heading`], but each level is tried on its own before
/// the next one is considered.
#[must_use]
pub fn preceding_heading_by_priority<'a>(
    node: ElementRef<'a>,
    levels: &[u8],
) -> Option<HeadingNode<'a>> {
    levels
        .iter()
        .find_map(|&level| preceding_heading(node, &[level]))
}

/// Lowercased caption text of a table.
#[must_use]
pub fn caption_text(table: ElementRef<'_>) -> Option<String> {
    table
        .select(&CAPTION)
        .next()
        .map(|c| text_of(c).to_lowercase())
}

/// Text of the document `<title>`.
#[must_use]
pub fn page_title(scope: ElementRef<'_>) -> String {
    scope.select(&TITLE).next().map(text_of).unwrap_or_default()
}

/// District identifier from a heading, caption or title.
///
/// Returns a bare number such as `"3"`, or [`AT_LARGE`].
#[must_use]
pub fn extract_district(text: &str) -> String {
    if AT_LARGE_RE.is_match(text) {
        return AT_LARGE.to_string();
    }
    if let Some(caps) = ORDINAL_RE.captures(text) {
        return caps[1].to_string();
    }
    if let Some(caps) = DISTRICT_RE.captures(text) {
        return caps[1].to_string();
    }

    let lower = text.trim().to_lowercase();
    if lower.contains("general election") || lower.contains("results") {
        return AT_LARGE.to_string();
    }
    NUMBER_RE
        .captures(text)
        .map_or_else(|| AT_LARGE.to_string(), |caps| caps[1].to_string())
}

/// Whether a results table reports a general election.
///
/// The caption decides when it is conclusive; otherwise the nearest `h3`
/// or `h4` above the table does. Tables with neither signal are rejected.
#[must_use]
pub fn is_general_election_table(table: ElementRef<'_>) -> bool {
    if let Some(caption) = caption_text(table) {
        if caption.contains("primary") || caption.contains("runoff") {
            return false;
        }
        if caption.contains("election") {
            return true;
        }
    }

    if let Some(heading) = preceding_heading(table, &[3, 4]) {
        let text = heading.text().to_lowercase();
        if text.contains("general election") || text.contains("results") {
            return true;
        }
    }
    false
}

/// Absolute profile URL for a site-relative `/wiki/` link.
#[must_use]
pub fn wiki_url(href: &str) -> Option<String> {
    href.starts_with("/wiki/").then(|| format!("{WIKI_BASE}{href}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        let selector = Selector::parse(css).expect("valid selector");
        doc.select(&selector).next().expect("element present")
    }

    #[test]
    fn test_extract_district_variants() {
        assert_eq!(extract_district("District 3[edit]"), "3");
        assert_eq!(extract_district("Ohio's 13th congressional district"), "13");
        assert_eq!(extract_district("At-large district"), AT_LARGE);
        assert_eq!(extract_district("at large"), AT_LARGE);
        assert_eq!(extract_district("General election results"), AT_LARGE);
        assert_eq!(extract_district("Seat 7"), "7");
        assert_eq!(extract_district("Overview"), AT_LARGE);
    }

    #[test]
    fn test_find_heading_bare_and_wrapped_are_identical() {
        let bare = Html::parse_document(
            "<body><h2>Overview</h2><h2>District 3<span>[edit]</span></h2></body>",
        );
        let wrapped = Html::parse_document(
            r#"<body><div class="mw-heading mw-heading2"><h2>Overview</h2></div>
               <div class="mw-heading mw-heading2"><h2>District 3</h2><span>[edit]</span></div></body>"#,
        );

        let a = find_heading(bare.root_element(), &["district"], &[2]).expect("bare heading");
        let b = find_heading(wrapped.root_element(), &["district"], &[2]).expect("wrapped heading");
        assert_eq!(a.text(), "District 3");
        assert_eq!(b.text(), "District 3");
        assert_eq!(a.level, b.level);
        assert!(has_class(b.container, "mw-heading"));
    }

    #[test]
    fn test_find_heading_levels_are_sequential() {
        // The h3 appears first in the document but h2 is searched first.
        let doc = Html::parse_document(
            "<body><h3>District 5 results</h3><p>x</p><h2>District 5</h2></body>",
        );
        let found = find_heading(doc.root_element(), &["district 5"], &[2, 3]).expect("heading");
        assert_eq!(found.level, 2);

        let found = find_heading(doc.root_element(), &["district 5"], &[3, 2]).expect("heading");
        assert_eq!(found.level, 3);
        assert!(find_heading(doc.root_element(), &["senate"], &[2, 3]).is_none());
    }

    #[test]
    fn test_preceding_heading_walks_siblings_and_wrappers() {
        let doc = Html::parse_document(
            r#"<body>
              <div class="mw-heading mw-heading2"><h2>District 3</h2></div>
              <p>Intro</p>
              <div class="mw-heading mw-heading3"><h3>General election</h3></div>
              <table id="t" class="wikitable"><tr><td>x</td></tr></table>
            </body>"#,
        );
        let table = first(&doc, "#t");

        let h2 = preceding_heading(table, &[2]).expect("h2");
        assert_eq!(h2.text(), "District 3");
        let nearest = preceding_heading(table, &[2, 3]).expect("nearest");
        assert_eq!(nearest.level, 3);
        let prioritized = preceding_heading_by_priority(table, &[2, 3]).expect("prioritized");
        assert_eq!(prioritized.level, 2);
    }

    #[test]
    fn test_preceding_heading_climbs_out_of_containers() {
        let doc = Html::parse_document(
            r#"<body><h2>District 7</h2>
               <div class="layout"><div><table id="t"><tr><td>x</td></tr></table></div></div>
            </body>"#,
        );
        let heading = preceding_heading(first(&doc, "#t"), &[2]).expect("heading");
        assert_eq!(extract_district(&heading.text()), "7");
    }

    #[test]
    fn test_general_election_table_by_caption() {
        let doc = Html::parse_document(
            r#"<body>
              <table id="primary"><caption>Democratic primary results</caption></table>
              <table id="general"><caption>2024 Ohio's 3rd congressional district election</caption></table>
            </body>"#,
        );
        assert!(!is_general_election_table(first(&doc, "#primary")));
        assert!(is_general_election_table(first(&doc, "#general")));
    }

    #[test]
    fn test_general_election_table_by_heading() {
        let doc = Html::parse_document(
            r#"<body>
              <h3>Republican primary</h3><table id="a"><tr><td>x</td></tr></table>
              <div class="mw-heading mw-heading3"><h3>General election</h3></div>
              <table id="b"><tr><td>x</td></tr></table>
              <h4>Polling</h4><table id="c"><tr><td>x</td></tr></table>
            </body>"#,
        );
        assert!(!is_general_election_table(first(&doc, "#a")));
        assert!(is_general_election_table(first(&doc, "#b")));
        assert!(!is_general_election_table(first(&doc, "#c")));
    }

    #[test]
    fn test_page_title_and_wiki_url() {
        let doc = Html::parse_document(
            "<html><head><title>2024 Texas State Senate election - Wikipedia</title></head></html>",
        );
        assert_eq!(
            page_title(doc.root_element()),
            "2024 Texas State Senate election - Wikipedia"
        );
        assert_eq!(
            wiki_url("/wiki/Jane_Doe").as_deref(),
            Some("https://en.wikipedia.org/wiki/Jane_Doe")
        );
        assert!(wiki_url("https://example.com").is_none());
    }
}
