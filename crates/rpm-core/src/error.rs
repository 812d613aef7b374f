use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArtifactError>;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("{0}")]
    NotFound(String),

    #[error("unexpected listing layout at {url}: {reason}")]
    ListingFormat { url: String, reason: String },

    #[error("timestamp `{value}` does not match format `{format}`")]
    InvalidTimestamp { value: String, format: &'static str },

    #[error("invalid artifact pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    pub(crate) fn fetch(url: impl ToString, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn listing(url: impl ToString, reason: impl ToString) -> Self {
        Self::ListingFormat {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
