use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::ListingEntry;
use crate::error::{ArtifactError, Result};

static PRE: Lazy<Selector> = Lazy::new(|| Selector::parse("pre").expect("static selector"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

/// Which anchors of an HTML directory index make up the listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HtmlExtraction {
    /// Artifactory-style index: the first `<pre>` block is a header and the
    /// second one holds the real entries. Anything else in the page is ignored.
    SecondPreBlock,
    /// Every anchor in document order.
    AllAnchors,
}

/// Parse an HTML directory index into listing entries.
///
/// The modification time of an entry is the first two whitespace separated
/// tokens of the text node that follows its anchor (`17-Oct-2024 10:20  -`).
pub fn parse_directory_index(
    body: &str,
    rule: HtmlExtraction,
    url: &str,
) -> Result<Vec<ListingEntry>> {
    let document = Html::parse_document(body);
    let entries = match rule {
        HtmlExtraction::SecondPreBlock => {
            let blocks: Vec<ElementRef<'_>> = document.select(&PRE).collect();
            let Some(block) = blocks.get(1) else {
                return Err(ArtifactError::listing(
                    url,
                    format!(
                        "expected at least 2 <pre> blocks, found {}",
                        blocks.len()
                    ),
                ));
            };
            block.select(&ANCHOR).filter_map(anchor_entry).collect()
        }
        HtmlExtraction::AllAnchors => document.select(&ANCHOR).filter_map(anchor_entry).collect(),
    };
    Ok(entries)
}

fn anchor_entry(anchor: ElementRef<'_>) -> Option<ListingEntry> {
    let href = anchor.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    let name = anchor.text().collect::<String>();
    let stamp = anchor
        .next_sibling()
        .and_then(|node| node.value().as_text().map(|text| leading_stamp(text)))
        .unwrap_or_default();
    Some(ListingEntry::new(name.trim(), href, stamp))
}

fn leading_stamp(text: &str) -> String {
    text.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}
