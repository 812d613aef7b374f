use std::fmt;

use chrono::NaiveDateTime;

use crate::error::{ArtifactError, Result};
use crate::listing::{ListingEntry, TimestampFormat};
use crate::locate::ArtifactPattern;

/// Second test an entry must pass on top of the package family token.
#[derive(Clone, Debug)]
pub enum Qualifier {
    /// The href must contain this substring, e.g. an OS major version tag.
    Contains(String),
    /// The href must match the compiled RPM pattern.
    Pattern(ArtifactPattern),
}

impl Qualifier {
    fn accepts(&self, href: &str) -> bool {
        match self {
            Self::Contains(token) => href.contains(token.as_str()),
            Self::Pattern(pattern) => pattern.matches(href),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EntryFilter {
    pub family: String,
    pub qualifier: Qualifier,
}

impl EntryFilter {
    pub fn new(family: impl Into<String>, qualifier: Qualifier) -> Self {
        Self {
            family: family.into(),
            qualifier,
        }
    }

    pub fn accepts(&self, entry: &ListingEntry) -> bool {
        entry.href.contains(self.family.as_str()) && self.qualifier.accepts(&entry.href)
    }
}

impl fmt::Display for EntryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Qualifier::Contains(token) => {
                write!(f, "`{}` and `{}`", self.family, token)
            }
            Qualifier::Pattern(pattern) => {
                write!(f, "`{}` matching `{}`", self.family, pattern)
            }
        }
    }
}

/// Pick the qualifying entry with the newest timestamp.
///
/// Entries rejected by `filter` never take part in the comparison and their
/// timestamps are not parsed. On equal timestamps the entry seen first wins.
pub fn resolve_latest<'a>(
    entries: &'a [ListingEntry],
    filter: &EntryFilter,
    format: TimestampFormat,
) -> Result<&'a ListingEntry> {
    let mut latest: Option<(&'a ListingEntry, NaiveDateTime)> = None;
    for entry in entries {
        if !filter.accepts(entry) {
            continue;
        }
        let stamp = format.parse(&entry.last_modified)?;
        match latest {
            Some((_, newest)) if stamp <= newest => {}
            _ => latest = Some((entry, stamp)),
        }
    }
    latest
        .map(|(entry, _)| entry)
        .ok_or_else(|| ArtifactError::NotFound(format!("no listing entry matches {filter}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_entry(href: &str, stamp: &str) -> ListingEntry {
        ListingEntry::new(href, href, stamp)
    }

    fn el9_dirs() -> EntryFilter {
        EntryFilter::new("noobaa-core", Qualifier::Contains("el9".to_string()))
    }

    #[test]
    fn picks_newest_qualifying_entry() {
        let entries = vec![
            html_entry("noobaa-core-5.14-el9/", "01-Jan-2024 10:00"),
            html_entry("noobaa-core-5.15-el9/", "01-Mar-2024 10:00"),
            html_entry("noobaa-core-5.13-el9/", "01-Feb-2024 10:00"),
        ];
        let latest = resolve_latest(&entries, &el9_dirs(), TimestampFormat::DirectoryIndex).unwrap();
        assert_eq!(latest.href, "noobaa-core-5.15-el9/");
    }

    #[test]
    fn non_qualifying_entries_never_win() {
        let entries = vec![
            html_entry("noobaa-core-5.14-el9/", "01-Jan-2024 10:00"),
            html_entry("noobaa-core-5.16-el8/", "01-Dec-2024 10:00"),
            html_entry("noobaa-operator-el9/", "01-Dec-2024 10:00"),
        ];
        let latest = resolve_latest(&entries, &el9_dirs(), TimestampFormat::DirectoryIndex).unwrap();
        assert_eq!(latest.href, "noobaa-core-5.14-el9/");
    }

    #[test]
    fn equal_stamps_keep_first_seen() {
        let entries = vec![
            html_entry("noobaa-core-a-el9/", "01-Mar-2024 10:00"),
            html_entry("noobaa-core-b-el9/", "01-Mar-2024 10:00"),
        ];
        let latest = resolve_latest(&entries, &el9_dirs(), TimestampFormat::DirectoryIndex).unwrap();
        assert_eq!(latest.href, "noobaa-core-a-el9/");
    }

    #[test]
    fn unparsed_stamps_of_rejected_entries_are_ignored() {
        let entries = vec![
            html_entry("../", ""),
            html_entry("noobaa-core-5.14-el9/", "01-Jan-2024 10:00"),
        ];
        assert!(resolve_latest(&entries, &el9_dirs(), TimestampFormat::DirectoryIndex).is_ok());
    }

    #[test]
    fn bad_stamp_on_qualifying_entry_is_an_error() {
        let entries = vec![html_entry("noobaa-core-5.14-el9/", "yesterday")];
        let err = resolve_latest(&entries, &el9_dirs(), TimestampFormat::DirectoryIndex).unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidTimestamp { .. }));
    }

    #[test]
    fn empty_listing_is_not_found() {
        let err = resolve_latest(&[], &el9_dirs(), TimestampFormat::DirectoryIndex).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
        assert!(err.to_string().contains("`noobaa-core` and `el9`"));
    }

    #[test]
    fn all_rejected_is_not_found() {
        let entries = vec![html_entry("noobaa-core-5.14-el8/", "01-Jan-2024 10:00")];
        let err = resolve_latest(&entries, &el9_dirs(), TimestampFormat::DirectoryIndex).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[test]
    fn pattern_qualifier_on_bucket_keys() {
        let pattern =
            ArtifactPattern::compile(r"noobaa-core-.*-{rhel_version}\.{arch}\.rpm", "el9", "x86_64")
                .unwrap();
        let filter = EntryFilter::new("noobaa-core", Qualifier::Pattern(pattern));
        let entries = vec![
            html_entry("noobaa-core-1.0-el9.x86_64.rpm", "2024-01-01T00:00:00.000Z"),
            html_entry("noobaa-core-3.0-el8.x86_64.rpm", "2024-09-01T00:00:00.000Z"),
            html_entry("noobaa-core-2.0-el9.x86_64.rpm", "2024-06-01T00:00:00.000Z"),
        ];
        let latest = resolve_latest(&entries, &filter, TimestampFormat::BucketListing).unwrap();
        assert_eq!(latest.name, "noobaa-core-2.0-el9.x86_64.rpm");
    }
}
