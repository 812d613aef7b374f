//! RPM resolution core for the NooBaa standalone installer.
//!
//! This crate turns a remote repository listing (an S3-style XML bucket
//! listing for the upstream channel, or an authenticated HTML directory index
//! for the downstream channel) into the absolute URL of the newest
//! `noobaa-core` package for the configured platform. It does not run
//! commands or install anything; `noobaa-sa-host` wraps these helpers with the
//! provisioning pipeline.

pub mod channel;
pub mod error;
pub mod listing;
pub mod locate;
pub mod resolve;
pub mod source;

pub use channel::{Channel, ResolvedArtifact, RpmResolver, RpmSettings, select_channel};
pub use error::{ArtifactError, Result};
pub use listing::{ListingEntry, TimestampFormat};
pub use locate::{ArtifactPattern, locate_file};
pub use resolve::{EntryFilter, Qualifier, resolve_latest};
pub use source::{ArtifactSource, Credentials, HttpSource};
