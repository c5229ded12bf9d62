//! Canvass Fetch - Rate-limited access to upstream election sources.
//!
//! Every upstream request goes through a [`Fetcher`], which owns one
//! [`HostGate`] per [`HostClass`]. A gate enforces the class's minimum
//! inter-request delay for all callers sharing the fetcher and, for the
//! search class, holds the shared exponential backoff state.
//!
//! # Example
//!
//! ```rust,ignore
//! use canvass_fetch::{Fetcher, HostClass, DuckDuckGoSearch, SearchProvider};
//! use std::sync::Arc;
//!
//! let fetcher = Arc::new(Fetcher::new(&config.fetch)?);
//! let page = fetcher.fetch("https://en.wikipedia.org/wiki/...", HostClass::Wiki).await?;
//!
//! let search = DuckDuckGoSearch::new(fetcher.clone());
//! let hits = search.search("\"Jane Doe\" Ohio", Some("ballotpedia.org"), 5).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod error;
pub mod fetcher;
pub mod host;
pub mod search;

// Re-export commonly used types
pub use error::{FetchError, Result, SearchError};
pub use fetcher::{FetchedPage, Fetcher, PageSource};
pub use host::{HostClass, HostGate, HostPolicy, RateLimitDecision};
pub use search::{DuckDuckGoSearch, SearchHit, SearchProvider};
