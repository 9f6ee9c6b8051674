//! Joins processed segments back into one document.

use crate::processing::types::SegmentResult;

const SEPARATOR: &str = "\n\n";

/// Merge segment results in order.
pub fn merge(results: &[SegmentResult]) -> String {
    let merged = merge_texts(results.iter().map(SegmentResult::text));
    if results.len() > 1 {
        tracing::info!(
            segment_count = results.len(),
            merged_chars = merged.chars().count(),
            "Merged processed segments"
        );
    }
    merged
}

/// Merge already-ordered texts.
///
/// A single text is returned unchanged. Later texts that open with markdown
/// headings lose those heading lines, since every segment tends to restate
/// the document title.
pub fn merge_texts<'a, I>(texts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut texts = texts.into_iter();
    let Some(first) = texts.next() else {
        return String::new();
    };

    let mut merged = first.to_string();
    for text in texts {
        merged.push_str(SEPARATOR);
        merged.push_str(strip_leading_headings(text));
    }
    merged
}

/// Drop heading lines before the first non-empty, non-heading line.
///
/// Text that does not start with `#`, or that has no content line after
/// line 0, is returned as is.
fn strip_leading_headings(text: &str) -> &str {
    if !text.starts_with('#') {
        return text;
    }

    let mut offset = 0;
    for (line_no, line) in text.split('\n').enumerate() {
        if !line.is_empty() && !line.starts_with('#') {
            return if line_no > 0 { &text[offset..] } else { text };
        }
        offset += line.len() + 1;
    }
    text
}
