use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use tracing::{debug, info};
use url::Url;

use crate::error::{ArtifactError, Result};

pub mod downstream;
pub mod upstream;

pub use downstream::DownstreamResolver;
pub use upstream::UpstreamResolver;

/// HTTP basic credentials for the downstream artifact repository.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Remote side of artifact resolution: fetch listings and download files.
/// Every call is a single attempt; any non-200 answer is terminal.
pub trait ArtifactSource {
    fn fetch_listing(&self, url: &Url, credentials: Option<&Credentials>) -> Result<String>;

    fn download(
        &self,
        url: &Url,
        credentials: Option<&Credentials>,
        dest_dir: &Path,
    ) -> Result<PathBuf>;
}

/// `timeout` bounds connecting and whole listing requests. Downloads only
/// get the connect bound, so a large RPM on a slow mirror is never cut off.
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: Client,
    listing_timeout: Duration,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| ArtifactError::fetch("<client>", err))?;
        Ok(Self {
            client,
            listing_timeout: timeout,
        })
    }

    fn get(
        &self,
        url: &Url,
        credentials: Option<&Credentials>,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let mut request: RequestBuilder = self.client.get(url.clone());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        if let Some(creds) = credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }
        let response = request.send().map_err(|err| ArtifactError::fetch(url, err))?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ArtifactError::fetch(url, format!("HTTP status {status}")));
        }
        Ok(response)
    }
}

impl ArtifactSource for HttpSource {
    fn fetch_listing(&self, url: &Url, credentials: Option<&Credentials>) -> Result<String> {
        debug!(%url, authenticated = credentials.is_some(), "fetching listing");
        self.get(url, credentials, Some(self.listing_timeout))?
            .text()
            .map_err(|err| ArtifactError::fetch(url, err))
    }

    fn download(
        &self,
        url: &Url,
        credentials: Option<&Credentials>,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let file_name = download_file_name(url)?;
        fs::create_dir_all(dest_dir).map_err(|source| ArtifactError::Io {
            path: dest_dir.to_path_buf(),
            source,
        })?;
        let path = dest_dir.join(file_name);
        let mut response = self.get(url, credentials, None)?;
        let mut file = File::create(&path).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
        let size = response
            .copy_to(&mut file)
            .map_err(|err| ArtifactError::fetch(url, err))?;
        info!(%url, path = %path.display(), bytes = size, "download finished");
        Ok(path)
    }
}

/// Last non-empty path segment of `url`.
pub fn download_file_name(url: &Url) -> Result<String> {
    url.path_segments()
        .and_then(|segments| segments.rev().find(|s| !s.is_empty()))
        .map(str::to_string)
        .ok_or_else(|| ArtifactError::fetch(url, "URL has no file name to download to"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_last_segment() {
        let url = Url::parse("http://repo/a/b/noobaa-core-1.el9.x86_64.rpm").unwrap();
        assert_eq!(
            download_file_name(&url).unwrap(),
            "noobaa-core-1.el9.x86_64.rpm"
        );
    }

    #[test]
    fn bare_host_has_no_file_name() {
        let url = Url::parse("http://repo/").unwrap();
        assert!(download_file_name(&url).is_err());
    }

    #[test]
    fn debug_hides_password() {
        let creds = Credentials::new("ci", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("ci"));
        assert!(!rendered.contains("hunter2"));
    }
}
