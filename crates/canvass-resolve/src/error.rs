use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache file exists but matches no known layout. Fatal for a run.
    #[error("unrecognized cache file {path}: {reason}")]
    UnknownSchema { path: PathBuf, reason: String },

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
