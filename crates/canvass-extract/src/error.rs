use canvass_fetch::FetchError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no known table shape matched: {detail}")]
    ShapeUnrecognized { detail: String },

    #[error("unknown race family: {0}")]
    UnknownRaceFamily(String),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
}
