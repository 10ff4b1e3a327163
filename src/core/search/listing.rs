//! Search result listing parser.
//!
//! A result entry is an anchor directly under a `<tt>` whose bold child is
//! the matched text; its href is `<path>#<line>`.

use scraper::{ElementRef, Html, Selector};

use crate::error::{Error, Result};

/// A single `(path, line)` hit from the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingHit {
    pub path: String,
    pub line: u32,
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| {
        Error::internal_unexpected(format!("Invalid selector '{}': {:?}", css, e))
    })
}

/// Extracts every hit whose highlighted text equals `highlighted`.
/// Entries with a malformed target reference are skipped.
pub fn parse_listing(html: &str, highlighted: &str) -> Result<Vec<ListingHit>> {
    let document = Html::parse_document(html);
    let anchors = selector("tt > a")?;

    let hits = document
        .select(&anchors)
        .filter(|anchor| highlights(anchor, highlighted))
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(split_target)
        .collect();

    Ok(hits)
}

fn highlights(anchor: &ElementRef<'_>, highlighted: &str) -> bool {
    anchor
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "b")
        .any(|bold| bold.text().collect::<String>() == highlighted)
}

/// Splits `path#line` on the first fragment separator.
pub fn split_target(href: &str) -> Option<ListingHit> {
    let (path, fragment) = href.split_once('#')?;
    let line = fragment.trim().parse::<u32>().ok()?;
    if path.is_empty() || line == 0 {
        return None;
    }
    Some(ListingHit {
        path: path.to_string(),
        line,
    })
}
