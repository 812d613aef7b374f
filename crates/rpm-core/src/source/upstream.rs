use tracing::info;
use url::Url;

use super::ArtifactSource;
use crate::error::{ArtifactError, Result};
use crate::listing::{TimestampFormat, parse_bucket_listing};
use crate::resolve::{EntryFilter, resolve_latest};

/// Resolves the newest RPM from the public S3 bucket. The bucket is flat, so
/// the newest qualifying key is the artifact itself.
#[derive(Debug)]
pub struct UpstreamResolver<'a> {
    base_url: &'a str,
}

impl<'a> UpstreamResolver<'a> {
    pub fn new(base_url: &'a str) -> Self {
        Self { base_url }
    }

    pub fn latest(&self, source: &dyn ArtifactSource, filter: &EntryFilter) -> Result<Url> {
        let listing_url = parse_url(self.base_url)?;
        let body = source.fetch_listing(&listing_url, None)?;
        let entries = parse_bucket_listing(&body, self.base_url)?;
        let latest = resolve_latest(&entries, filter, TimestampFormat::BucketListing)?;
        info!(key = %latest.name, "latest upstream RPM");
        parse_url(&format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            latest.href
        ))
    }
}

pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| ArtifactError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}
