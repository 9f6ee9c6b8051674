//! Data carried between the processing stages.

use crate::error::{Result, ScriptsmithError};
use crate::llm::TokenUsage;
use crate::processing::strategy::ProcessingStrategy;
use std::time::Duration;

/// One slice of a split document.
///
/// Offsets and lengths are in characters. `overlap_with_previous` and
/// `overlap_with_next` are the number of characters actually shared with the
/// neighbouring segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    index: usize,
    text: String,
    char_count: usize,
    start: usize,
    overlap_with_previous: usize,
    overlap_with_next: usize,
}

impl Segment {
    /// Segment starting at character offset `start` with no declared overlaps.
    pub fn new(index: usize, start: usize, text: String) -> Self {
        let char_count = text.chars().count();
        Self {
            index,
            text,
            char_count,
            start,
            overlap_with_previous: 0,
            overlap_with_next: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.char_count
    }

    /// Offset of the first character in the source document.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Offset one past the last character in the source document.
    pub fn end(&self) -> usize {
        self.start + self.char_count
    }

    pub fn overlap_with_previous(&self) -> usize {
        self.overlap_with_previous
    }

    pub fn overlap_with_next(&self) -> usize {
        self.overlap_with_next
    }

    /// Text with the leading overlap removed.
    pub fn text_without_leading_overlap(&self) -> &str {
        match self.text.char_indices().nth(self.overlap_with_previous) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }

    pub(crate) fn set_overlaps(&mut self, previous: usize, next: usize) {
        self.overlap_with_previous = previous;
        self.overlap_with_next = next;
    }
}

/// Validated output of one segment dispatch.
#[derive(Debug, Clone)]
pub struct SegmentResult {
    segment: Segment,
    text: String,
    usage: TokenUsage,
    elapsed: Duration,
    attempts: u32,
}

impl SegmentResult {
    /// Build a result, rejecting text shorter than `min_chars` after trimming.
    ///
    /// A short result means the service failed silently; it is never accepted.
    pub fn new(
        segment: Segment,
        text: String,
        usage: TokenUsage,
        elapsed: Duration,
        attempts: u32,
        min_chars: usize,
    ) -> Result<Self> {
        let length = text.trim().chars().count();
        if length < min_chars {
            return Err(ScriptsmithError::Validation {
                index: segment.index(),
                length,
                minimum: min_chars,
            });
        }
        Ok(Self {
            segment,
            text,
            usage,
            elapsed,
            attempts,
        })
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of service calls it took to get this result.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Final output of one processing run.
#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub merged_text: String,
    pub strategy: ProcessingStrategy,
    /// Per-segment results; only present for chunked processing.
    pub segment_results: Option<Vec<SegmentResult>>,
    pub total_usage: TokenUsage,
    pub total_elapsed: Duration,
    /// Character count of the source document.
    pub source_chars: usize,
    /// `chars(merged_text) / source_chars`.
    pub size_ratio: f64,
    /// Service calls made, retries included.
    pub api_calls: u32,
}

impl AggregateResult {
    /// Number of segments the document was processed as.
    pub fn segment_count(&self) -> usize {
        self.segment_results.as_ref().map_or(1, Vec::len)
    }

    pub fn merged_chars(&self) -> usize {
        self.merged_text.chars().count()
    }
}

/// Ratio of output length to source length, 1.0 for an empty source.
pub fn size_ratio(output_chars: usize, source_chars: usize) -> f64 {
    if source_chars == 0 {
        1.0
    } else {
        output_chars as f64 / source_chars as f64
    }
}
