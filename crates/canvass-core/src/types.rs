//! Shared types used across Canvass.
//!
//! Candidate identities, extracted records, contact links and resolution
//! results. Everything here is transient except [`ResolutionResult`], which
//! is persisted by the resolution cache.

use crate::error::CanvassError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delimiter joining identity components into the canonical cache key.
pub const KEY_DELIMITER: char = '|';

/// The subject of a contact resolution.
///
/// Two identities with equal components are the same resolution subject,
/// even when they come from different races or years. The canonical key
/// intentionally omits year and race type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateIdentity {
    party: String,
    state: String,
    district: Option<String>,
    name: String,
}

impl CandidateIdentity {
    /// Create a new identity.
    ///
    /// # Errors
    /// Returns error if the name is empty or any component contains the key
    /// delimiter.
    pub fn new(
        party: impl Into<String>,
        state: impl Into<String>,
        district: Option<&str>,
        name: impl Into<String>,
    ) -> Result<Self, CanvassError> {
        let identity = Self {
            party: party.into().trim().to_string(),
            state: state.into().trim().to_string(),
            district: district
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            name: name.into().trim().to_string(),
        };
        identity.validate()?;
        Ok(identity)
    }

    fn validate(&self) -> Result<(), CanvassError> {
        if self.name.is_empty() {
            return Err(CanvassError::Validation(
                "candidate identity requires a non-empty name".to_string(),
            ));
        }

        let components = [
            self.party.as_str(),
            self.state.as_str(),
            self.district.as_deref().unwrap_or_default(),
            self.name.as_str(),
        ];
        if components.iter().any(|c| c.contains(KEY_DELIMITER)) {
            return Err(CanvassError::Validation(format!(
                "identity components must not contain '{KEY_DELIMITER}': {}",
                components.join(", ")
            )));
        }
        Ok(())
    }

    /// Party as it appeared in the source.
    #[must_use]
    pub fn party(&self) -> &str {
        &self.party
    }

    /// State (or city, for municipal races).
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// District, absent for statewide races.
    #[must_use]
    pub fn district(&self) -> Option<&str> {
        self.district.as_deref()
    }

    /// Candidate full name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last whitespace-separated token of the name.
    #[must_use]
    pub fn surname(&self) -> &str {
        self.name.split_whitespace().last().unwrap_or(&self.name)
    }

    /// Canonical `party|state|district|name` key. Statewide races leave the
    /// district segment empty.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{party}{d}{state}{d}{district}{d}{name}",
            party = self.party,
            state = self.state,
            district = self.district.as_deref().unwrap_or_default(),
            name = self.name,
            d = KEY_DELIMITER,
        )
    }
}

impl fmt::Display for CandidateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

/// One candidate row extracted from a results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Party label; abbreviation or full name depending on the table shape,
    /// empty where the shape carries no party.
    pub party: String,
    /// Candidate name (or "Yes"/"No" for retention races).
    pub name: String,
    /// Link to the candidate's profile page, if the row carried one.
    pub profile_url: Option<String>,
    /// Vote share as a percentage in `0.0..=100.0`.
    pub vote_pct: Option<f64>,
    /// Whether the source marked this row as the winner.
    pub is_winner: bool,
}

/// A single race on a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    /// State, or city for municipal races.
    pub state: String,
    /// Race type label, e.g. "US House", "State Senate".
    pub race_type: String,
    /// Election year.
    pub year: i32,
    /// District identifier, `None` for statewide races.
    pub district: Option<String>,
    /// Page the results were extracted from.
    pub source_url: String,
}

/// Records extracted for one race, handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResult {
    /// Race metadata.
    pub election: Election,
    /// Candidates in table order.
    pub candidates: Vec<CandidateRecord>,
}

/// Kind of contact link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// Campaign website
    CampaignSite,
    /// Campaign Facebook page
    CampaignFacebook,
    /// Campaign X/Twitter account
    CampaignX,
    /// Campaign Instagram account
    CampaignInstagram,
    /// Personal website
    PersonalWebsite,
    /// Personal Facebook page
    PersonalFacebook,
    /// Personal LinkedIn profile
    PersonalLinkedin,
}

impl LinkType {
    /// Stable snake-case name, as stored by the persistence layer.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CampaignSite => "campaign_site",
            Self::CampaignFacebook => "campaign_facebook",
            Self::CampaignX => "campaign_x",
            Self::CampaignInstagram => "campaign_instagram",
            Self::PersonalWebsite => "personal_website",
            Self::PersonalFacebook => "personal_facebook",
            Self::PersonalLinkedin => "personal_linkedin",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a contact link was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSource {
    /// Wikipedia profile infobox or external links
    Wikipedia,
    /// Ballotpedia profile infobox
    Ballotpedia,
    /// Scored general web search
    WebSearch,
}

impl LinkSource {
    /// Stable snake-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wikipedia => "wikipedia",
            Self::Ballotpedia => "ballotpedia",
            Self::WebSearch => "web_search",
        }
    }
}

impl fmt::Display for LinkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed contact link with provenance and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactLink {
    /// Link kind
    #[serde(rename = "type")]
    pub link_type: LinkType,
    /// Link target as found in the source
    pub url: String,
    /// Discovery source
    pub source: LinkSource,
    /// Confidence in `0.0..=1.0`
    pub confidence: f64,
}

impl ContactLink {
    /// Create a link, clamping confidence into `0.0..=1.0`.
    #[must_use]
    pub fn new(
        link_type: LinkType,
        url: impl Into<String>,
        source: LinkSource,
        confidence: f64,
    ) -> Self {
        Self {
            link_type,
            url: url.into(),
            source,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Outcome of one resolution attempt, as stored in the resolution cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Whether an accepted link was found
    pub found: bool,
    /// The accepted link, present iff `found`
    pub link: Option<ContactLink>,
    /// When the resolution ran
    pub attempted_at: Timestamp,
    /// Profile page consulted by the structured lookup, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    /// Other links the structured lookup produced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_links: Vec<ContactLink>,
}

impl ResolutionResult {
    /// A result carrying an accepted link.
    #[must_use]
    pub fn found(link: ContactLink) -> Self {
        Self {
            found: true,
            link: Some(link),
            attempted_at: Timestamp::now(),
            profile_url: None,
            related_links: Vec::new(),
        }
    }

    /// A definitive "not found".
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            found: false,
            link: None,
            attempted_at: Timestamp::now(),
            profile_url: None,
            related_links: Vec::new(),
        }
    }

    /// Attach the structured-lookup profile page and its other links.
    #[must_use]
    pub fn with_profile(mut self, profile_url: Option<String>, related: Vec<ContactLink>) -> Self {
        self.profile_url = profile_url;
        self.related_links = related;
        self
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, CanvassError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| CanvassError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
