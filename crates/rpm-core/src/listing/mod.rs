use chrono::NaiveDateTime;

use crate::error::{ArtifactError, Result};

pub mod html;
pub mod xml;

pub use html::{HtmlExtraction, parse_directory_index};
pub use xml::parse_bucket_listing;

/// One row of a remote listing. The timestamp is kept as the raw text found
/// in the listing and only parsed for entries that pass a filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub href: String,
    pub last_modified: String,
    pub is_directory: bool,
}

impl ListingEntry {
    pub fn new(
        name: impl Into<String>,
        href: impl Into<String>,
        last_modified: impl Into<String>,
    ) -> Self {
        let href = href.into();
        Self {
            name: name.into(),
            is_directory: href.ends_with('/'),
            href,
            last_modified: last_modified.into(),
        }
    }
}

/// Timestamp layouts used by the two listing flavours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `17-Oct-2024 10:20`, as printed by HTML directory indexes.
    DirectoryIndex,
    /// `2024-06-01T12:30:00.000Z`, as returned by S3 bucket listings.
    BucketListing,
}

impl TimestampFormat {
    pub fn pattern(self) -> &'static str {
        match self {
            Self::DirectoryIndex => "%d-%b-%Y %H:%M",
            Self::BucketListing => "%Y-%m-%dT%H:%M:%S%.fZ",
        }
    }

    pub fn parse(self, raw: &str) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw.trim(), self.pattern()).map_err(|_| {
            ArtifactError::InvalidTimestamp {
                value: raw.to_string(),
                format: self.pattern(),
            }
        })
    }
}
