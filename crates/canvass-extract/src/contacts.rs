//! Typed contact links from candidate profile pages.

use crate::normalize::{find_heading, has_class, text_of};
use canvass_core::{ContactLink, LinkSource, LinkType};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

static PERSON_INFOBOX: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.infobox.person").expect("valid selector"));
static WIDGET_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.widget-row").expect("valid selector"));
static WIKI_INFOBOX: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.infobox").expect("valid selector"));
static INFOBOX_LABEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("th.infobox-label").expect("valid selector"));
static EXTERNAL_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.external").expect("valid selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Marker class shared by the rows of one infobox section.
const NEUTRAL_ROW_CLASS: &str = "white";

/// Layout family of a profile page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Ballotpedia person infobox with a "Contact" widget section
    Ballotpedia,
    /// Wikipedia infobox "Website" row or "External links" list
    Wikipedia,
}

impl SourceKind {
    fn link_source(self) -> LinkSource {
        match self {
            Self::Ballotpedia => LinkSource::Ballotpedia,
            Self::Wikipedia => LinkSource::Wikipedia,
        }
    }
}

/// Extract contact links from a profile fragment.
///
/// A page with no contact section yields an empty list.
#[must_use]
pub fn extract_contacts(fragment: ElementRef<'_>, kind: SourceKind) -> Vec<ContactLink> {
    match kind {
        SourceKind::Ballotpedia => ballotpedia_contacts(fragment),
        SourceKind::Wikipedia => wikipedia_campaign_site(fragment)
            .map(|url| ContactLink::new(LinkType::CampaignSite, url, kind.link_source(), 1.0))
            .into_iter()
            .collect(),
    }
}

fn ballotpedia_contacts(fragment: ElementRef<'_>) -> Vec<ContactLink> {
    let infobox = if has_class(fragment, "infobox") && has_class(fragment, "person") {
        fragment
    } else {
        match fragment.select(&PERSON_INFOBOX).next() {
            Some(infobox) => infobox,
            None => return Vec::new(),
        }
    };

    let Some(header) = infobox
        .select(&WIDGET_ROW)
        .find(|row| text_of(*row).eq_ignore_ascii_case("contact"))
    else {
        return Vec::new();
    };

    let mut links: Vec<ContactLink> = Vec::new();
    let rows = header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|e| has_class(*e, "widget-row"));

    // Rows after the header belong to the contact section until the
    // marker class changes.
    for row in rows {
        if !has_class(row, NEUTRAL_ROW_CLASS) {
            break;
        }
        let Some((label, url)) = contact_entry(row) else {
            continue;
        };
        if let Some(link_type) = classify_contact(&label, &url) {
            links.push(ContactLink::new(link_type, url, LinkSource::Ballotpedia, 1.0));
        }
    }
    links
}

/// `(label, url)` from a linked row or a `Label: value` text row.
///
/// A linked row takes its label from the text before the first `:` and
/// falls back to the anchor text when the row has no separator.
fn contact_entry(row: ElementRef<'_>) -> Option<(String, String)> {
    let text = text_of(row);

    if let Some(anchor) = row.select(&LINK).next() {
        let href = anchor.value().attr("href")?.trim();
        if href.is_empty() {
            return None;
        }
        let label = label_separator(&text)
            .map(|split| text[..split].trim().to_lowercase())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| text_of(anchor).to_lowercase());
        return Some((label, href.to_string()));
    }

    let split = label_separator(&text)?;
    let label = text[..split].trim().to_lowercase();
    let value = text[split + 1..].trim();
    if label.is_empty() || !value.contains('.') {
        return None;
    }
    Some((label, value.to_string()))
}

/// Byte offset of the first `:` that is not part of a URL scheme.
fn label_separator(text: &str) -> Option<usize> {
    text.char_indices()
        .find(|(i, c)| *c == ':' && !text[i + 1..].starts_with("//"))
        .map(|(i, _)| i)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Platform {
    Site,
    Facebook,
    X,
    Instagram,
    Linkedin,
}

/// Lowercased host without `www.`; bare `fb.com/...` values are accepted.
fn host_of(url: &str) -> String {
    let url = url.trim();
    let parsed = if url.contains("://") {
        Url::parse(url)
    } else {
        Url::parse(&format!("https://{url}"))
    };
    parsed
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .map(|h| h.trim_start_matches("www.").to_string())
        .unwrap_or_default()
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

fn platform_from_domain(url: &str) -> Option<Platform> {
    let host = host_of(url);
    if host_matches(&host, "facebook.com") || host_matches(&host, "fb.com") {
        Some(Platform::Facebook)
    } else if host_matches(&host, "x.com") || host_matches(&host, "twitter.com") {
        Some(Platform::X)
    } else if host_matches(&host, "instagram.com") {
        Some(Platform::Instagram)
    } else if host_matches(&host, "linkedin.com") {
        Some(Platform::Linkedin)
    } else {
        None
    }
}

fn platform_from_label(label: &str) -> Option<Platform> {
    let words: Vec<&str> = label.split_whitespace().collect();
    if label.contains("facebook") {
        Some(Platform::Facebook)
    } else if label.contains("twitter") || words.contains(&"x") {
        Some(Platform::X)
    } else if label.contains("instagram") {
        Some(Platform::Instagram)
    } else if label.contains("linkedin") {
        Some(Platform::Linkedin)
    } else if label.contains("website") || label.contains("site") {
        Some(Platform::Site)
    } else {
        None
    }
}

/// Classify one contact row.
///
/// Platform is decided by the URL's domain first and the label second;
/// "personal" in the label selects the `personal_*` family, anything else
/// the `campaign_*` family. Combinations with no link type are dropped.
#[must_use]
pub fn classify_contact(label: &str, url: &str) -> Option<LinkType> {
    let label = label.to_lowercase();
    let platform = platform_from_domain(url).or_else(|| platform_from_label(&label))?;
    let personal = label.contains("personal");

    match (personal, platform) {
        (false, Platform::Site) => Some(LinkType::CampaignSite),
        (false, Platform::Facebook) => Some(LinkType::CampaignFacebook),
        (false, Platform::X) => Some(LinkType::CampaignX),
        (false, Platform::Instagram) => Some(LinkType::CampaignInstagram),
        (true, Platform::Site) => Some(LinkType::PersonalWebsite),
        (true, Platform::Facebook) => Some(LinkType::PersonalFacebook),
        (_, Platform::Linkedin) => Some(LinkType::PersonalLinkedin),
        (true, Platform::X | Platform::Instagram) => None,
    }
}

fn wikipedia_campaign_site(fragment: ElementRef<'_>) -> Option<String> {
    infobox_website(fragment).or_else(|| external_links_campaign(fragment))
}

/// Infobox "Website" row: a link labelled campaign, else a lone link, else
/// the first non-government link.
fn infobox_website(fragment: ElementRef<'_>) -> Option<String> {
    let infobox = fragment.select(&WIKI_INFOBOX).next()?;

    infobox
        .select(&INFOBOX_LABEL)
        .filter(|th| text_of(*th).eq_ignore_ascii_case("website"))
        .find_map(|th| {
            let data = th
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "td" && has_class(*e, "infobox-data"))?;

            let links: Vec<(String, String)> = data
                .select(&EXTERNAL_LINK)
                .filter_map(|a| Some((text_of(a).to_lowercase(), a.value().attr("href")?.to_string())))
                .collect();

            if let Some((_, href)) = links.iter().find(|(text, _)| text.contains("campaign")) {
                return Some(href.clone());
            }
            if let [(_, href)] = links.as_slice() {
                return Some(href.clone());
            }
            links
                .into_iter()
                .map(|(_, href)| href)
                .find(|href| !href.contains(".gov"))
        })
}

/// First "External links" list item mentioning a campaign.
fn external_links_campaign(fragment: ElementRef<'_>) -> Option<String> {
    let heading = find_heading(fragment, &["external links"], &[2])?;

    for sibling in heading.container.next_siblings().filter_map(ElementRef::wrap) {
        let name = sibling.value().name();
        if name.len() == 2 && name.starts_with('h') {
            break;
        }
        if name == "div" && has_class(sibling, "mw-heading") {
            break;
        }
        if name != "ul" {
            continue;
        }

        let found = sibling
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|li| li.value().name() == "li")
            .filter(|li| text_of(*li).to_lowercase().contains("campaign"))
            .find_map(|li| {
                li.select(&EXTERNAL_LINK)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string)
            });
        if found.is_some() {
            return found;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn contacts(html: &str, kind: SourceKind) -> Vec<ContactLink> {
        let doc = Html::parse_document(html);
        extract_contacts(doc.root_element(), kind)
    }

    #[test]
    fn test_contact_section_ends_at_marker_change() {
        let links = contacts(
            r#"<div class="infobox person">
                 <div class="widget-row value-only black">Jane Doe</div>
                 <div class="widget-row value-only">Contact</div>
                 <div class="widget-row value-only white">Campaign website: janedoe2024.com</div>
                 <div class="widget-row value-only white">Facebook: fb.com/janedoe</div>
                 <div class="widget-row value-only black">Personal website: janedoe.net</div>
               </div>"#,
            SourceKind::Ballotpedia,
        );

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].link_type, LinkType::CampaignSite);
        assert_eq!(links[0].url, "janedoe2024.com");
        assert_eq!(links[0].source, LinkSource::Ballotpedia);
        assert!((links[0].confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(links[1].link_type, LinkType::CampaignFacebook);
        assert_eq!(links[1].url, "fb.com/janedoe");
    }

    #[test]
    fn test_linked_rows() {
        let links = contacts(
            r#"<div class="infobox person">
                 <div class="widget-row">Contact</div>
                 <div class="widget-row white"><a href="https://www.janedoe.com/">Campaign website</a></div>
                 <div class="widget-row white"><a href="https://x.com/janedoe">Campaign X</a></div>
                 <div class="widget-row white"><a href="https://instagram.com/janedoe">Campaign Instagram</a></div>
                 <div class="widget-row white"><a href="https://www.linkedin.com/in/janedoe">Personal LinkedIn</a></div>
                 <div class="widget-row white"><a href="https://www.facebook.com/jane.doe">Personal Facebook</a></div>
               </div>"#,
            SourceKind::Ballotpedia,
        );

        let types: Vec<LinkType> = links.iter().map(|l| l.link_type).collect();
        assert_eq!(
            types,
            vec![
                LinkType::CampaignSite,
                LinkType::CampaignX,
                LinkType::CampaignInstagram,
                LinkType::PersonalLinkedin,
                LinkType::PersonalFacebook,
            ]
        );
        assert_eq!(links[0].url, "https://www.janedoe.com/");
    }

    #[test]
    fn test_linked_rows_take_label_before_colon() {
        let links = contacts(
            r#"<div class="infobox person">
                 <div class="widget-row">Contact</div>
                 <div class="widget-row white">Campaign website: <a href="https://janedoe2024.com">janedoe2024.com</a></div>
                 <div class="widget-row white">Personal Facebook: <a href="https://fb.com/jdoe">fb.com/jdoe</a></div>
                 <div class="widget-row white">Personal website: <a href="https://janedoe.net">janedoe.net</a></div>
               </div>"#,
            SourceKind::Ballotpedia,
        );

        let found: Vec<(LinkType, &str)> = links
            .iter()
            .map(|l| (l.link_type, l.url.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                (LinkType::CampaignSite, "https://janedoe2024.com"),
                (LinkType::PersonalFacebook, "https://fb.com/jdoe"),
                (LinkType::PersonalWebsite, "https://janedoe.net"),
            ]
        );
    }

    #[test]
    fn test_no_contact_section() {
        assert!(contacts("<div class=\"infobox person\"></div>", SourceKind::Ballotpedia).is_empty());
        assert!(contacts("<p>nothing here</p>", SourceKind::Ballotpedia).is_empty());
    }

    #[test]
    fn test_domain_rule_beats_label_rule() {
        // The label says website but the domain is Facebook.
        assert_eq!(
            classify_contact("campaign website", "https://facebook.com/janedoe"),
            Some(LinkType::CampaignFacebook)
        );
        assert_eq!(
            classify_contact("personal website", "https://janedoe.net"),
            Some(LinkType::PersonalWebsite)
        );
        assert_eq!(classify_contact("email", "mailto:jane@doe.com"), None);
        assert_eq!(classify_contact("personal x", "https://x.com/janedoe"), None);
        // A domain that merely ends in "x.com" is not X.
        assert_eq!(
            classify_contact("campaign website", "https://fairfax.com"),
            Some(LinkType::CampaignSite)
        );
    }

    #[test]
    fn test_wikipedia_infobox_prefers_campaign_link() {
        let links = contacts(
            r#"<table class="infobox"><tbody>
                 <tr><th class="infobox-label">Website</th>
                     <td class="infobox-data">
                       <a class="external" href="https://doe.house.gov">House website</a>
                       <a class="external" href="https://janedoe.com">Campaign website</a>
                     </td></tr>
               </tbody></table>"#,
            SourceKind::Wikipedia,
        );
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::CampaignSite);
        assert_eq!(links[0].url, "https://janedoe.com");
        assert_eq!(links[0].source, LinkSource::Wikipedia);
    }

    #[test]
    fn test_wikipedia_infobox_skips_government_link() {
        let links = contacts(
            r#"<table class="infobox"><tbody>
                 <tr><th class="infobox-label">Website</th>
                     <td class="infobox-data">
                       <a class="external" href="https://doe.senate.gov">Senate</a>
                       <a class="external" href="https://janedoe.org">Official</a>
                     </td></tr>
               </tbody></table>"#,
            SourceKind::Wikipedia,
        );
        assert_eq!(links[0].url, "https://janedoe.org");
    }

    #[test]
    fn test_wikipedia_external_links_fallback() {
        let links = contacts(
            r#"<body>
                 <div class="mw-heading mw-heading2"><h2 id="External_links">External links</h2></div>
                 <ul>
                   <li><a class="external" href="https://doe.house.gov">Congresswoman Jane Doe</a> official site</li>
                   <li><a class="external" href="https://janedoe2024.com">Jane Doe for Congress</a> campaign website</li>
                 </ul>
                 <div class="mw-heading mw-heading2"><h2>References</h2></div>
                 <ul><li><a class="external" href="https://other.com">campaign finance</a></li></ul>
               </body>"#,
            SourceKind::Wikipedia,
        );
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://janedoe2024.com");
    }

    #[test]
    fn test_wikipedia_nothing_found() {
        assert!(contacts("<body><h2>Early life</h2></body>", SourceKind::Wikipedia).is_empty());
    }
}
