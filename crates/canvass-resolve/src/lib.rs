//! Canvass Resolve - Find each candidate's campaign website.
//!
//! Resolution runs in two tiers. The profile tier searches the candidate's
//! profile page and reads its contact section; if that yields no campaign
//! site the web tier scores general search hits with [`score_hit`]. Every
//! outcome, found or not, lands in a [`ResolutionCache`] so interrupted runs
//! resume without repeating searches.
//!
//! # Example
//!
//! ```rust,ignore
//! use canvass_resolve::{ResolutionCache, ResolutionEngine, SearchContext};
//!
//! let cache = ResolutionCache::open(config.cache_path()?)?;
//! let engine = ResolutionEngine::new(search, pages, cache, config.resolution.clone());
//! let result = engine
//!     .resolve_with(&identity, &SearchContext::new(2024, "congress"))
//!     .await;
//! engine.flush().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache;
pub mod engine;
#[allow(missing_docs)]
pub mod error;
pub mod scoring;

// Re-export commonly used types
pub use cache::{ResolutionCache, SCHEMA_VERSION};
pub use engine::{profile_query, web_queries, ResolutionEngine, SearchContext, PROFILE_SITE};
pub use error::{CacheError, Result};
pub use scoring::{score_hit, SKIP_DOMAINS};
