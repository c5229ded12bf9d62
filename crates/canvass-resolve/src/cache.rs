//! Resumable resolution cache.
//!
//! A JSON file mapping canonical identity keys to [`ResolutionResult`]s:
//!
//! ```json
//! { "version": 1, "entries": { "Democratic|Ohio|3|Jane Doe": { "found": true, ... } } }
//! ```
//!
//! Files written by older harvesters are a flat `key -> { label: url }` map
//! and are converted on load. Flushes write a sibling temp file and rename
//! it over the cache, so a crash mid-flush leaves the previous flush intact.

use crate::error::{CacheError, Result};
use canvass_core::{ContactLink, LinkSource, LinkType, ResolutionResult};
use canvass_extract::classify_contact;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current on-disk layout version.
pub const SCHEMA_VERSION: u32 = 1;

/// Legacy label holding the accepted campaign site.
const LEGACY_CAMPAIGN_LABEL: &str = "campaign website";
/// Legacy pseudo-label holding the profile page consulted.
const LEGACY_PROFILE_LABEL: &str = "_ballotpedia_url";
/// Confidence assigned to a legacy campaign site found by web search.
const LEGACY_WEB_CONFIDENCE: f64 = 0.3;

#[derive(Serialize)]
struct CacheFile<'a> {
    version: u32,
    entries: &'a BTreeMap<String, ResolutionResult>,
}

/// Durable key-value store of resolution outcomes.
#[derive(Debug)]
pub struct ResolutionCache {
    path: PathBuf,
    entries: BTreeMap<String, ResolutionResult>,
    unflushed: usize,
}

impl ResolutionCache {
    /// Load the cache at `path`, or start empty if the file does not exist.
    ///
    /// Entries that cannot be read are skipped with a warning. A file that
    /// is not a JSON object, or carries an unsupported version, is
    /// [`CacheError::UnknownSchema`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cache file, starting empty");
                return Ok(Self::empty(path));
            }
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            warn!(path = %path.display(), "Cache file is empty, starting empty");
            return Ok(Self::empty(path));
        }

        let value: Value = serde_json::from_str(&raw).map_err(|e| CacheError::UnknownSchema {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let Value::Object(map) = value else {
            return Err(CacheError::UnknownSchema {
                path,
                reason: "top level is not a JSON object".to_string(),
            });
        };

        let entries = if is_versioned(&map) {
            load_versioned(&path, &map)?
        } else {
            info!(path = %path.display(), "Converting legacy cache layout");
            load_legacy(map)
        };

        info!(path = %path.display(), entries = entries.len(), "Loaded resolution cache");
        Ok(Self {
            path,
            entries,
            unflushed: 0,
        })
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            entries: BTreeMap::new(),
            unflushed: 0,
        }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached result for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ResolutionResult> {
        self.entries.get(key)
    }

    /// Store `result` under `key`, replacing any previous entry.
    pub fn insert(&mut self, key: impl Into<String>, result: ResolutionResult) {
        self.entries.insert(key.into(), result);
        self.unflushed += 1;
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts since the last successful flush.
    #[must_use]
    pub fn unflushed(&self) -> usize {
        self.unflushed
    }

    /// All entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolutionResult)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Write every entry durably in the current layout.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_vec_pretty(&CacheFile {
            version: SCHEMA_VERSION,
            entries: &self.entries,
        })?;
        let tmp = self.temp_path();
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Flushed resolution cache");
        self.unflushed = 0;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn is_versioned(map: &Map<String, Value>) -> bool {
    map.contains_key("version") && map.get("entries").is_some_and(Value::is_object)
}

fn load_versioned(
    path: &Path,
    map: &Map<String, Value>,
) -> Result<BTreeMap<String, ResolutionResult>> {
    let version = map.get("version").and_then(Value::as_u64);
    if version != Some(u64::from(SCHEMA_VERSION)) {
        return Err(CacheError::UnknownSchema {
            path: path.to_path_buf(),
            reason: format!("unsupported version {}", map["version"]),
        });
    }

    let mut entries = BTreeMap::new();
    let Some(Value::Object(raw_entries)) = map.get("entries") else {
        return Ok(entries);
    };
    for (key, value) in raw_entries {
        match serde_json::from_value::<ResolutionResult>(value.clone()) {
            Ok(result) => {
                entries.insert(key.clone(), result);
            }
            Err(e) => warn!(%key, error = %e, "Skipping unreadable cache entry"),
        }
    }
    Ok(entries)
}

fn load_legacy(map: Map<String, Value>) -> BTreeMap<String, ResolutionResult> {
    let mut entries = BTreeMap::new();
    for (key, value) in map {
        match legacy_entry(&value) {
            Some(result) => {
                entries.insert(key, result);
            }
            None => warn!(%key, "Skipping unreadable legacy cache entry"),
        }
    }
    entries
}

/// Convert one legacy `{ label: url }` map.
///
/// An empty map was a definitive "not found". A campaign site recorded
/// alongside a profile URL came from the profile page; without one it came
/// from web search.
fn legacy_entry(value: &Value) -> Option<ResolutionResult> {
    let Value::Object(labels) = value else {
        return None;
    };
    let mut links: Vec<(String, String)> = Vec::with_capacity(labels.len());
    for (label, url) in labels {
        links.push((label.to_lowercase(), url.as_str()?.to_string()));
    }

    let profile_url = links
        .iter()
        .find(|(label, _)| label == LEGACY_PROFILE_LABEL)
        .map(|(_, url)| url.clone());
    let campaign = links
        .iter()
        .find(|(label, _)| label == LEGACY_CAMPAIGN_LABEL)
        .map(|(_, url)| url.clone());

    let related: Vec<ContactLink> = links
        .iter()
        .filter(|(label, _)| label != LEGACY_PROFILE_LABEL && label != LEGACY_CAMPAIGN_LABEL)
        .filter_map(|(label, url)| {
            classify_contact(label, url)
                .map(|kind| ContactLink::new(kind, url.clone(), LinkSource::Ballotpedia, 1.0))
        })
        .collect();

    let result = match campaign {
        Some(url) => {
            let (source, confidence) = if profile_url.is_some() {
                (LinkSource::Ballotpedia, 1.0)
            } else {
                (LinkSource::WebSearch, LEGACY_WEB_CONFIDENCE)
            };
            ResolutionResult::found(ContactLink::new(
                LinkType::CampaignSite,
                url,
                source,
                confidence,
            ))
        }
        None => ResolutionResult::not_found(),
    };
    Some(result.with_profile(profile_url, related))
}
