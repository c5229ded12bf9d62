//! Canvass Core - Foundation crate for the Canvass election harvester.
//!
//! This crate provides the shared election data model, error handling,
//! configuration management and tracing setup that the fetch, extract and
//! resolve crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Candidate identities, records, contact links and resolution results
//! - [`logging`] - `tracing-subscriber` initialization
//!
//! # Example
//!
//! ```rust
//! use canvass_core::{AppConfig, CandidateIdentity};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.resolution.flush_interval, 25);
//!
//! let identity = CandidateIdentity::new("Democratic", "Ohio", Some("3"), "Jane Doe")?;
//! assert_eq!(identity.cache_key(), "Democratic|Ohio|3|Jane Doe");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, CacheConfig, FetchConfig, ResolutionConfig};
pub use error::{CanvassError, ConfigError, ConfigResult, Result};
pub use types::{
    CandidateIdentity, CandidateRecord, ContactLink, Election, ElectionResult, LinkSource,
    LinkType, ResolutionResult, Timestamp, KEY_DELIMITER,
};
