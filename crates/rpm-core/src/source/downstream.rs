use tracing::info;
use url::Url;

use super::upstream::parse_url;
use super::{ArtifactSource, Credentials};
use crate::error::{ArtifactError, Result};
use crate::listing::{HtmlExtraction, TimestampFormat, parse_directory_index};
use crate::locate::{ArtifactPattern, locate_file};
use crate::resolve::{EntryFilter, resolve_latest};

/// Resolves the newest RPM from the authenticated artifact repository.
///
/// The repository root lists one directory per build. The newest qualifying
/// directory is chosen first, then the RPM for the configured platform is
/// located inside it.
#[derive(Debug)]
pub struct DownstreamResolver<'a> {
    base_url: &'a str,
    repo_path: &'a str,
    credentials: Option<&'a Credentials>,
}

impl<'a> DownstreamResolver<'a> {
    pub fn new(
        base_url: &'a str,
        repo_path: &'a str,
        credentials: Option<&'a Credentials>,
    ) -> Self {
        Self {
            base_url,
            repo_path,
            credentials,
        }
    }

    pub fn listing_url(&self) -> Result<Url> {
        let base = parse_url(self.base_url)?;
        base.join(self.repo_path).map_err(|source| ArtifactError::InvalidUrl {
            url: self.repo_path.to_string(),
            source,
        })
    }

    pub fn latest(
        &self,
        source: &dyn ArtifactSource,
        directories: &EntryFilter,
        pattern: &ArtifactPattern,
    ) -> Result<Url> {
        let listing_url = self.listing_url()?;
        let body = source.fetch_listing(&listing_url, self.credentials)?;
        let entries =
            parse_directory_index(&body, HtmlExtraction::SecondPreBlock, listing_url.as_str())?;
        let latest = resolve_latest(&entries, directories, TimestampFormat::DirectoryIndex)?;
        info!(directory = %latest.href, "latest downstream build");

        let build_url = listing_url
            .join(&latest.href)
            .map_err(|source| ArtifactError::InvalidUrl {
                url: latest.href.clone(),
                source,
            })?;
        let body = source.fetch_listing(&build_url, self.credentials)?;
        let files = parse_directory_index(&body, HtmlExtraction::AllAnchors, build_url.as_str())?;
        locate_file(&files, pattern, &build_url)
    }
}
