//! Canvass Extract - Election results and contact links from wiki markup.
//!
//! Pages are parsed with `scraper`; every function here takes an already
//! parsed document or fragment and returns plain data. The one async entry
//! point is [`Harvester`], which fetches an index page, follows its result
//! links and hands each page to the family's [`RaceScraper`].
//!
//! # Example
//!
//! ```rust,ignore
//! use canvass_extract::{Harvester, RaceFamily};
//! use std::sync::Arc;
//!
//! let harvester = Harvester::new(Arc::new(fetcher));
//! for result in harvester.harvest(RaceFamily::Senate, 2024).await? {
//!     println!("{} {}: {} candidates", result.election.state,
//!         result.election.race_type, result.candidates.len());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod contacts;
#[allow(missing_docs)]
pub mod error;
pub mod harvest;
pub mod normalize;
pub mod races;
pub mod shape;

// Re-export commonly used types
pub use contacts::{classify_contact, extract_contacts, SourceKind};
pub use error::{ExtractError, Result};
pub use harvest::Harvester;
pub use normalize::{extract_district, find_heading, is_general_election_table, AT_LARGE};
pub use races::{IndexRequest, PageTarget, RaceFamily, RaceScraper};
pub use shape::{classify_table, extract_rows, extract_rows_in, Section, TableShape};
