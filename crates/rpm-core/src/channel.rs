use std::fmt;

use tracing::info;
use url::Url;

use crate::error::Result;
use crate::locate::ArtifactPattern;
use crate::resolve::{EntryFilter, Qualifier};
use crate::source::upstream::parse_url;
use crate::source::{ArtifactSource, Credentials, DownstreamResolver, UpstreamResolver};

/// Distribution channel the main package comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    /// Public S3 bucket, XML listing, no authentication.
    Upstream,
    /// Artifact repository, HTML index, HTTP basic authentication.
    Downstream,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upstream => "upstream",
            Self::Downstream => "downstream",
        })
    }
}

/// Decide the channel for a deployment.
///
/// Upstream when the flag is set or the override URL points into the
/// upstream bucket, except that an override URL pointing into the downstream
/// repository always means downstream, whatever the flag says.
pub fn select_channel(
    override_url: Option<&str>,
    upstream_flag: bool,
    upstream_base_url: &str,
    downstream_base_url: &str,
) -> Channel {
    let url = override_url.unwrap_or_default();
    let mut upstream = upstream_flag || contains_base(url, upstream_base_url);
    if contains_base(url, downstream_base_url) {
        upstream = false;
    }
    if upstream {
        Channel::Upstream
    } else {
        Channel::Downstream
    }
}

fn contains_base(url: &str, base: &str) -> bool {
    !base.is_empty() && url.contains(base)
}

#[derive(Clone, Debug)]
pub struct RpmSettings {
    /// Explicit package URL; when set no listing is fetched.
    pub override_url: Option<String>,
    pub upstream: bool,
    pub upstream_base_url: String,
    pub downstream_base_url: String,
    pub downstream_path: String,
    /// Package family token every candidate href must contain.
    pub package_family: String,
    pub pattern: ArtifactPattern,
    pub credentials: Option<Credentials>,
}

impl RpmSettings {
    pub fn channel(&self) -> Channel {
        select_channel(
            self.override_url.as_deref(),
            self.upstream,
            &self.upstream_base_url,
            &self.downstream_base_url,
        )
    }

    pub fn credentials_for(&self, channel: Channel) -> Option<&Credentials> {
        match channel {
            Channel::Upstream => None,
            Channel::Downstream => self.credentials.as_ref(),
        }
    }
}

/// Final download location of the main package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub url: Url,
    pub channel: Channel,
}

pub struct RpmResolver<'a> {
    settings: &'a RpmSettings,
    source: &'a dyn ArtifactSource,
}

impl<'a> RpmResolver<'a> {
    pub fn new(settings: &'a RpmSettings, source: &'a dyn ArtifactSource) -> Self {
        Self { settings, source }
    }

    pub fn resolve(&self) -> Result<ResolvedArtifact> {
        let settings = self.settings;
        let channel = settings.channel();
        if let Some(raw) = settings.override_url.as_deref() {
            info!(url = raw, %channel, "using configured RPM URL");
            return Ok(ResolvedArtifact {
                url: parse_url(raw)?,
                channel,
            });
        }
        let url = match channel {
            Channel::Upstream => {
                let filter = EntryFilter::new(
                    settings.package_family.clone(),
                    Qualifier::Pattern(settings.pattern.clone()),
                );
                UpstreamResolver::new(&settings.upstream_base_url).latest(self.source, &filter)?
            }
            Channel::Downstream => {
                let filter = EntryFilter::new(
                    settings.package_family.clone(),
                    Qualifier::Contains(settings.pattern.platform_tag().to_string()),
                );
                DownstreamResolver::new(
                    &settings.downstream_base_url,
                    &settings.downstream_path,
                    settings.credentials_for(channel),
                )
                .latest(self.source, &filter, &settings.pattern)?
            }
        };
        info!(%url, %channel, "resolved RPM");
        Ok(ResolvedArtifact { url, channel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UP: &str = "https://noobaa-core-rpms.s3.amazonaws.com";
    const DOWN: &str = "https://artifactory.example.com/";

    #[test]
    fn flag_alone_selects_upstream() {
        assert_eq!(select_channel(None, true, UP, DOWN), Channel::Upstream);
        assert_eq!(select_channel(None, false, UP, DOWN), Channel::Downstream);
    }

    #[test]
    fn upstream_url_selects_upstream_without_flag() {
        let url = format!("{UP}/noobaa-core-5.15.0.el9.x86_64.rpm");
        assert_eq!(select_channel(Some(&url), false, UP, DOWN), Channel::Upstream);
    }

    #[test]
    fn downstream_url_beats_upstream_flag() {
        let url = format!("{DOWN}noobaa/el9/noobaa-core.rpm");
        assert_eq!(select_channel(Some(&url), true, UP, DOWN), Channel::Downstream);
    }

    #[test]
    fn unrelated_url_follows_flag() {
        let url = "http://mirror.local/noobaa-core.rpm";
        assert_eq!(select_channel(Some(url), true, UP, DOWN), Channel::Upstream);
        assert_eq!(select_channel(Some(url), false, UP, DOWN), Channel::Downstream);
    }

    #[test]
    fn empty_bases_never_match() {
        assert_eq!(select_channel(Some("http://x/a.rpm"), true, "", ""), Channel::Upstream);
    }
}
