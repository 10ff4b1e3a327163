//! Annotated ("blame") view parser.
//!
//! Each source line is rendered as an anchor named after its number, class
//! `l` for ordinary lines and `hl` for highlighted ones. The revision label
//! sits near that anchor; where exactly depends on the index version, so
//! locating it is a pluggable [`RevisionLocator`].

use scraper::{ElementRef, Html};
use std::collections::BTreeSet;

use super::listing::selector;
use crate::error::Result;

/// Revision id and raw tooltip found for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionLabel {
    pub revision: String,
    pub comment: String,
}

/// Finds the revision label belonging to a line anchor.
pub trait RevisionLocator {
    fn locate(&self, line_anchor: ElementRef<'_>) -> Option<RevisionLabel>;
}

impl<F> RevisionLocator for F
where
    F: Fn(ElementRef<'_>) -> Option<RevisionLabel>,
{
    fn locate(&self, line_anchor: ElementRef<'_>) -> Option<RevisionLabel> {
        self(line_anchor)
    }
}

/// Default layout: the first child element of the anchor's next sibling
/// element carries the revision as text and the comment as `title`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NextSiblingLabel;

impl RevisionLocator for NextSiblingLabel {
    fn locate(&self, line_anchor: ElementRef<'_>) -> Option<RevisionLabel> {
        let container = line_anchor.next_siblings().find_map(ElementRef::wrap)?;
        let label = container.children().find_map(ElementRef::wrap)?;

        let revision = label.text().collect::<String>().trim().to_string();
        if revision.is_empty() {
            return None;
        }

        Some(RevisionLabel {
            revision,
            comment: label.value().attr("title").unwrap_or_default().to_string(),
        })
    }
}

/// Result of scanning one annotated page.
#[derive(Debug, Default)]
pub struct AnnotatedLines {
    pub labels: Vec<(u32, RevisionLabel)>,
    /// Lines with no anchor, or an anchor with no revision label.
    pub missing: Vec<u32>,
}

pub fn parse_annotated(
    html: &str,
    lines: &BTreeSet<u32>,
    locator: &dyn RevisionLocator,
) -> Result<AnnotatedLines> {
    let document = Html::parse_document(html);
    let mut result = AnnotatedLines::default();

    for &line in lines {
        match line_anchor(&document, line)?.and_then(|anchor| locator.locate(anchor)) {
            Some(label) => result.labels.push((line, label)),
            None => result.missing.push(line),
        }
    }

    Ok(result)
}

/// Plain line anchor first; the highlighted variant only when that misses.
fn line_anchor(document: &Html, line: u32) -> Result<Option<ElementRef<'_>>> {
    for class in ["l", "hl"] {
        let css = format!(r#"a.{}[name="{}"]"#, class, line);
        if let Some(anchor) = document.select(&selector(&css)?).next() {
            return Ok(Some(anchor));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANNOTATED: &str = r##"
        <html><body><pre>
        <a class="l" name="9" href="#9">9</a><span class="blame"><a class="r" title="changeset 41:aaa&#10;second line&lt;br/&gt;summary" href="/history">aaa111</a></span>
        <a class="hl" name="10" href="#10">10</a><span class="blame"><a class="r" title="fix flag" href="/history">bbb222</a></span>
        <a class="l" name="11" href="#11">11</a><span class="blame"><a class="r" title="other" href="/history">aaa111</a></span>
        <a class="l" name="12" href="#12">12</a>
        </pre></body></html>
    "##;

    fn lines(values: &[u32]) -> BTreeSet<u32> {
        values.iter().copied().collect()
    }

    #[test]
    fn plain_anchor_resolves_revision() {
        let parsed = parse_annotated(ANNOTATED, &lines(&[9]), &NextSiblingLabel).unwrap();

        assert_eq!(parsed.labels.len(), 1);
        let (line, label) = &parsed.labels[0];
        assert_eq!(*line, 9);
        assert_eq!(label.revision, "aaa111");
        assert_eq!(label.comment, "changeset 41:aaa\nsecond line<br/>summary");
    }

    #[test]
    fn falls_back_to_highlighted_anchor() {
        let parsed = parse_annotated(ANNOTATED, &lines(&[10]), &NextSiblingLabel).unwrap();
        assert_eq!(parsed.labels[0].1.revision, "bbb222");
        assert!(parsed.missing.is_empty());
    }

    #[test]
    fn absent_lines_are_reported_missing() {
        let parsed = parse_annotated(ANNOTATED, &lines(&[40]), &NextSiblingLabel).unwrap();
        assert!(parsed.labels.is_empty());
        assert_eq!(parsed.missing, vec![40]);
    }

    #[test]
    fn custom_locator_closure_is_used() {
        let locator = |anchor: ElementRef<'_>| {
            Some(RevisionLabel {
                revision: format!("line-{}", anchor.value().attr("name").unwrap_or("?")),
                comment: String::new(),
            })
        };
        let parsed = parse_annotated(ANNOTATED, &lines(&[12]), &locator).unwrap();
        assert_eq!(parsed.labels[0].1.revision, "line-12");
    }
}
