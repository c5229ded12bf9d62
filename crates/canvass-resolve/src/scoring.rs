//! Campaign-site plausibility score for web search hits.
//!
//! | signal                                                  | weight |
//! |---------------------------------------------------------|--------|
//! | surname appears in the domain (ignoring `-` and `.`)    | +0.40  |
//! | domain contains a campaign word (`elect`, `vote`, ...)  | +0.20  |
//! | URL is a site root                                      | +0.10  |
//! | title or snippet mentions campaign, congress or senate  | +0.10  |
//! | title or snippet says "official"                        | +0.05  |
//! | title or snippet names the candidate's state            | +0.05  |
//! | `.com` or `.org` domain                                 | +0.05  |
//!
//! Known news, aggregator, social and government domains score 0. The
//! total is capped at 1.0.

use canvass_core::CandidateIdentity;
use canvass_fetch::SearchHit;
use url::Url;

/// Domains that are never a candidate's own campaign site.
pub const SKIP_DOMAINS: [&str; 26] = [
    "ballotpedia.org",
    "wikipedia.org",
    "fec.gov",
    "opensecrets.org",
    "facebook.com",
    "twitter.com",
    "x.com",
    "youtube.com",
    "linkedin.com",
    "instagram.com",
    "reddit.com",
    "tiktok.com",
    "nytimes.com",
    "cnn.com",
    "foxnews.com",
    "washingtonpost.com",
    "politico.com",
    "nbcnews.com",
    "abcnews.go.com",
    "cbsnews.com",
    "apnews.com",
    "reuters.com",
    "thehill.com",
    "npr.org",
    "bbc.com",
    "usatoday.com",
];

const CAMPAIGN_WORDS: [&str; 6] = [
    "forcongress",
    "forsenate",
    "elect",
    "vote",
    "campaign",
    "committee",
];
const RACE_WORDS: [&str; 3] = ["campaign", "congress", "senate"];

/// Score `hit` as the campaign site of `identity`, in `0.0..=1.0`.
#[must_use]
pub fn score_hit(hit: &SearchHit, identity: &CandidateIdentity) -> f64 {
    let Ok(url) = Url::parse(&hit.url) else {
        return 0.0;
    };
    let Some(host) = url.host_str() else {
        return 0.0;
    };
    let host = host.to_lowercase();
    let domain = host.trim_start_matches("www.");
    if is_excluded(domain) {
        return 0.0;
    }

    let mut score = 0.0;
    let compact = domain.replace(['-', '.'], "");

    let surname = identity.surname().to_lowercase().replace(['\'', '-'], "");
    if !surname.is_empty() && compact.contains(&surname) {
        score += 0.4;
    }
    if CAMPAIGN_WORDS.iter().any(|w| compact.contains(w)) {
        score += 0.2;
    }
    if matches!(url.path(), "" | "/" | "/index.html") {
        score += 0.1;
    }

    let text = format!("{} {}", hit.title, hit.snippet).to_lowercase();
    if RACE_WORDS.iter().any(|w| text.contains(w)) {
        score += 0.1;
    }
    if text.contains("official") {
        score += 0.05;
    }
    let state = identity.state().to_lowercase();
    if !state.is_empty() && text.contains(&state) {
        score += 0.05;
    }
    if domain.ends_with(".com") || domain.ends_with(".org") {
        score += 0.05;
    }

    f64::min(score, 1.0)
}

fn is_excluded(domain: &str) -> bool {
    domain.ends_with(".gov")
        || domain.contains(".gov.")
        || SKIP_DOMAINS
            .iter()
            .any(|skip| domain == *skip || domain.ends_with(&format!(".{skip}")))
}
