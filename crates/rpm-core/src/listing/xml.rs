use roxmltree::{Document, Node};

use super::ListingEntry;
use crate::error::{ArtifactError, Result};

const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Parse an S3 `ListBucketResult` document. Every `Contents` element becomes
/// one entry keyed by its `Key`, stamped with its `LastModified`.
pub fn parse_bucket_listing(body: &str, url: &str) -> Result<Vec<ListingEntry>> {
    let document = Document::parse(body)
        .map_err(|err| ArtifactError::listing(url, format!("invalid XML: {err}")))?;
    let mut entries = Vec::new();
    for contents in document
        .root_element()
        .children()
        .filter(|node| is_s3_element(node, "Contents"))
    {
        let key = child_text(contents, "Key")
            .ok_or_else(|| ArtifactError::listing(url, "Contents element without Key"))?;
        let last_modified = child_text(contents, "LastModified").ok_or_else(|| {
            ArtifactError::listing(url, format!("Contents `{key}` without LastModified"))
        })?;
        entries.push(ListingEntry::new(key, key, last_modified));
    }
    Ok(entries)
}

fn is_s3_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && matches!(node.tag_name().namespace(), None | Some(S3_NAMESPACE))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|child| is_s3_element(child, name))
        .and_then(|child| child.text())
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_contents_in_document_order() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>noobaa-core-rpms</Name>
  <Contents><Key>noobaa-core-1.0-el9.x86_64.rpm</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified></Contents>
  <Contents><Key>noobaa-core-2.0-el9.x86_64.rpm</Key><LastModified>2024-06-01T00:00:00.000Z</LastModified></Contents>
</ListBucketResult>"#;
        let entries = parse_bucket_listing(body, "http://bucket").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "noobaa-core-1.0-el9.x86_64.rpm");
        assert_eq!(entries[1].last_modified, "2024-06-01T00:00:00.000Z");
    }

    #[test]
    fn foreign_namespace_is_ignored() {
        let body = r#"<ListBucketResult xmlns:x="urn:other">
  <x:Contents><x:Key>a.rpm</x:Key><x:LastModified>2024-01-01T00:00:00.000Z</x:LastModified></x:Contents>
</ListBucketResult>"#;
        assert!(parse_bucket_listing(body, "http://bucket").unwrap().is_empty());
    }

    #[test]
    fn missing_key_is_a_format_error() {
        let body = r#"<ListBucketResult><Contents><LastModified>2024-01-01T00:00:00.000Z</LastModified></Contents></ListBucketResult>"#;
        let err = parse_bucket_listing(body, "http://bucket").unwrap_err();
        assert!(matches!(err, ArtifactError::ListingFormat { .. }));
    }

    #[test]
    fn malformed_document_is_a_format_error() {
        let err = parse_bucket_listing("<ListBucketResult>", "http://bucket").unwrap_err();
        assert!(err.to_string().contains("invalid XML"));
    }
}
