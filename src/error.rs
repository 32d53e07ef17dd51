//! Error type for the fallible edges of the crate: loading data, parsing
//! arguments and talking to the cache database.
//!
//! The aggregation core never returns errors. Malformed survey data is
//! skipped, not reported.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A data source that was explicitly requested could not be read.
    #[error("Failed to read data source '{}': {source}", path.display())]
    DataSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Caller-supplied argument that does not name anything we know.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Cache database errors.
    #[error("Cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
