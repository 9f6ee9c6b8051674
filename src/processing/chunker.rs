//! Splits a document into overlapping segments at natural boundaries.
//!
//! Cut points prefer, in order:
//! - a paragraph break (`"\n\n"`) near the target position
//! - a sentence terminator (`.`, `!`, `?`) followed by a space
//! - the raw target position
//!
//! Positions are character offsets, so multi-byte text is never cut inside
//! a code point.

use crate::error::{Result, ScriptsmithError};
use crate::processing::types::Segment;

/// Probe spacing when looking for paragraph breaks.
const PARAGRAPH_STEP: usize = 50;

/// Probe spacing when looking for sentence ends.
const SENTENCE_STEP: usize = 10;

/// Search radius around a regular cut point.
const SPLIT_SEARCH_WINDOW: usize = 500;

/// Search radius around the midpoint of an oversized segment.
const OVERSIZE_SEARCH_WINDOW: usize = 1000;

/// A secondary split must be at least this far from either segment edge,
/// and an overlap that leaves less than this much progress is dropped.
const EDGE_MARGIN: usize = 100;

/// Counters describing one chunking run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    /// Iterations of the scan loop.
    pub iterations: usize,
    /// Oversized segments that were split at an interior point.
    pub oversize_splits: usize,
    /// Oversized segments kept whole because no interior split point existed.
    pub oversized_kept: usize,
}

/// Segments plus the stats of the run that produced them.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub segments: Vec<Segment>,
    pub stats: ChunkStats,
}

/// Overlapping segmenter with a fixed target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    target_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker.
    ///
    /// `target_size` must be positive and `overlap` at most half of it, so
    /// every regular cut advances by at least half a segment.
    pub fn new(target_size: usize, overlap: usize) -> Result<Self> {
        if target_size == 0 {
            return Err(ScriptsmithError::ConfigInvalidValue {
                key: "chunk_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if overlap > target_size / 2 {
            return Err(ScriptsmithError::ConfigInvalidValue {
                key: "chunk_overlap".to_string(),
                message: format!("{overlap} exceeds half of chunk_size {target_size}"),
            });
        }
        Ok(Self {
            target_size,
            overlap,
        })
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into segments.
    pub fn split(&self, text: &str) -> Result<Vec<Segment>> {
        self.plan(text).map(|plan| plan.segments)
    }

    /// Split `text` and report loop statistics alongside the segments.
    pub fn plan(&self, text: &str) -> Result<ChunkPlan> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        if len == 0 {
            return Err(ScriptsmithError::Chunking {
                message: "document is empty".to_string(),
            });
        }

        tracing::info!(
            text_length = len,
            chunk_size = self.target_size,
            overlap = self.overlap,
            "Starting text chunking"
        );

        if len <= self.target_size {
            tracing::info!(char_count = len, "Text fits in single segment");
            return Ok(ChunkPlan {
                segments: vec![Segment::new(0, 0, text.to_string())],
                stats: ChunkStats {
                    iterations: 1,
                    ..ChunkStats::default()
                },
            });
        }

        let (spans, stats) = self.scan(&chars);
        let segments = build_segments(&chars, &spans);

        tracing::info!(
            total_segments = segments.len(),
            avg_segment_size = segments.iter().map(Segment::char_count).sum::<usize>()
                / segments.len().max(1),
            oversize_splits = stats.oversize_splits,
            oversized_kept = stats.oversized_kept,
            "Text chunking completed"
        );
        for segment in &segments {
            tracing::debug!(
                index = segment.index(),
                char_count = segment.char_count(),
                overlap_with_previous = segment.overlap_with_previous(),
                oversized = segment.char_count() * 2 > self.target_size * 3,
                "Segment details"
            );
        }

        Ok(ChunkPlan { segments, stats })
    }

    /// Compute `(start, end)` character spans for text longer than the target.
    fn scan(&self, chars: &[char]) -> (Vec<(usize, usize)>, ChunkStats) {
        let len = chars.len();
        let mut spans = Vec::new();
        let mut stats = ChunkStats::default();
        let mut start = 0;

        while start < len {
            stats.iterations += 1;

            let mut end = (start + self.target_size).min(len);
            if end < len {
                end = start + find_split_point(&chars[start..], self.target_size, SPLIT_SEARCH_WINDOW);
            }

            let piece_len = end - start;
            if piece_len * 2 > self.target_size * 3 {
                tracing::warn!(
                    segment_index = spans.len(),
                    segment_size = piece_len,
                    max_size = self.target_size,
                    "Oversized segment detected"
                );

                let split = find_split_point(&chars[start..end], piece_len / 2, OVERSIZE_SEARCH_WINDOW);
                if split > EDGE_MARGIN && split + EDGE_MARGIN < piece_len {
                    tracing::info!(
                        first_part_size = split,
                        remaining_size = piece_len - split,
                        "Split oversized segment"
                    );
                    spans.push((start, start + split));
                    stats.oversize_splits += 1;

                    let mut next = (start + split).saturating_sub(self.overlap);
                    if next <= start {
                        next = start + split;
                    }
                    start = next;
                    continue;
                }

                tracing::warn!(
                    segment_index = spans.len(),
                    segment_size = piece_len,
                    "Could not split oversized segment, keeping as is"
                );
                stats.oversized_kept += 1;
            }

            spans.push((start, end));
            if end >= len {
                break;
            }

            let mut next = end.saturating_sub(self.overlap);
            if next + EDGE_MARGIN >= end || next <= start {
                next = end;
            }
            start = next;
        }

        (spans, stats)
    }
}

/// Materialise spans into segments with their real overlaps.
fn build_segments(chars: &[char], spans: &[(usize, usize)]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = spans
        .iter()
        .enumerate()
        .map(|(index, &(start, end))| {
            Segment::new(index, start, chars[start..end].iter().collect())
        })
        .collect();

    let overlaps: Vec<usize> = spans
        .windows(2)
        .map(|pair| pair[0].1.saturating_sub(pair[1].0))
        .collect();

    for (index, segment) in segments.iter_mut().enumerate() {
        let previous = if index == 0 { 0 } else { overlaps[index - 1] };
        let next = overlaps.get(index).copied().unwrap_or(0);
        segment.set_overlaps(previous, next);
    }

    segments
}

fn is_paragraph_break(chars: &[char], pos: usize) -> bool {
    chars[pos] == '\n' && chars[pos + 1] == '\n'
}

fn is_sentence_end(chars: &[char], pos: usize) -> bool {
    pos + 1 < chars.len() && matches!(chars[pos], '.' | '!' | '?') && chars[pos + 1] == ' '
}

/// Best cut position near `target` within `max_search` characters.
///
/// Probes backwards then forwards at growing offsets, first for a paragraph
/// break, then for a sentence end. The returned position is just after the
/// boundary, or `target` itself when nothing is found. Backward probes never
/// reach position 0, so the cut always leaves a non-empty prefix.
pub fn find_split_point(chars: &[char], target: usize, max_search: usize) -> usize {
    let len = chars.len();

    for offset in (0..max_search).step_by(PARAGRAPH_STEP) {
        if let Some(pos) = target.checked_sub(offset)
            && pos > 0
            && pos + 1 < len
            && is_paragraph_break(chars, pos)
        {
            return pos + 2;
        }

        let pos = target + offset;
        if pos + 2 < len && is_paragraph_break(chars, pos) {
            return pos + 2;
        }
    }

    for offset in (0..max_search).step_by(SENTENCE_STEP) {
        if let Some(pos) = target.checked_sub(offset)
            && pos > 0
            && is_sentence_end(chars, pos)
        {
            return pos + 2;
        }

        let pos = target + offset;
        if is_sentence_end(chars, pos) {
            return pos + 2;
        }
    }

    target
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    /// Reassemble the source by dropping each segment's leading overlap.
    fn reconstruct(segments: &[Segment]) -> String {
        segments
            .iter()
            .map(Segment::text_without_leading_overlap)
            .collect()
    }

    fn filler(len: usize) -> Vec<char> {
        vec!['x'; len]
    }

    #[test]
    fn new_rejects_overlap_above_half_the_target() {
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(100, 150).is_err());
        assert!(Chunker::new(100, 51).is_err());
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 50).is_ok());
        assert!(Chunker::new(1, 0).is_ok());
    }

    #[test]
    fn empty_text_is_chunking_error() {
        let chunker = Chunker::new(100, 10).unwrap();
        assert!(matches!(
            chunker.split(""),
            Err(ScriptsmithError::Chunking { .. })
        ));
    }

    #[test]
    fn text_at_target_size_is_one_segment_without_overlap() {
        let chunker = Chunker::new(1_000, 100).unwrap();
        let text = "y".repeat(1_000);
        let segments = chunker.split(&text).unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].index(), 0);
        assert_eq!(segments[0].text(), text);
        assert_eq!(segments[0].char_count(), 1_000);
        assert_eq!(segments[0].overlap_with_previous(), 0);
        assert_eq!(segments[0].overlap_with_next(), 0);
    }

    #[test]
    fn split_point_prefers_paragraph_break() {
        let mut text = filler(2_000);
        // Sentence end closer to the target than the paragraph break.
        text[1_000] = '.';
        text[1_001] = ' ';
        text[1_100] = '\n';
        text[1_101] = '\n';
        assert_eq!(find_split_point(&text, 1_000, 500), 1_102);
    }

    #[test]
    fn split_point_searches_backwards_first() {
        let mut text = filler(2_000);
        text[900] = '\n';
        text[901] = '\n';
        text[1_100] = '\n';
        text[1_101] = '\n';
        assert_eq!(find_split_point(&text, 1_000, 500), 902);
    }

    #[test]
    fn split_point_falls_back_to_sentence_end() {
        let mut text = filler(2_000);
        text[970] = '!';
        text[971] = ' ';
        assert_eq!(find_split_point(&text, 1_000, 500), 972);
    }

    #[test]
    fn split_point_ignores_terminator_without_space() {
        let mut text = filler(2_000);
        text[990] = '.';
        text[1_010] = '?';
        text[1_011] = ' ';
        assert_eq!(find_split_point(&text, 1_000, 500), 1_012);
    }

    #[test]
    fn split_point_falls_back_to_target() {
        let text = filler(2_000);
        assert_eq!(find_split_point(&text, 1_000, 500), 1_000);
    }

    #[test]
    fn split_point_outside_window_is_ignored() {
        let mut text = filler(3_000);
        text[1_600] = '\n';
        text[1_601] = '\n';
        assert_eq!(find_split_point(&text, 1_000, 500), 1_000);
    }

    #[test]
    fn backward_probe_skips_position_zero() {
        let text = chars("\n\nxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx");
        assert_eq!(text.len(), 52);
        assert_eq!(find_split_point(&text, 50, 500), 50);
    }

    #[test]
    fn paragraph_text_splits_on_breaks_with_overlap() {
        // 200-char paragraphs; a 1998 target lines the probes up with the breaks.
        let paragraph = format!("{}end\n\n", "word ".repeat(39));
        assert_eq!(paragraph.len(), 200);
        let text = paragraph.repeat(60);
        let chunker = Chunker::new(1_998, 300).unwrap();
        let segments = chunker.split(&text).unwrap();

        assert!(segments.len() > 1);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.index(), i);
            assert_eq!(segment.char_count(), segment.text().chars().count());
        }
        for pair in segments.windows(2) {
            assert_eq!(pair[0].overlap_with_next(), 300);
            assert_eq!(pair[1].overlap_with_previous(), 300);
            assert_eq!(pair[1].start() + 300, pair[0].end());
        }
        // Every non-final segment ends right after a paragraph break.
        for segment in &segments[..segments.len() - 1] {
            assert!(segment.text().ends_with("\n\n"), "segment {}", segment.index());
        }
        assert_eq!(reconstruct(&segments), text);
    }

    #[test]
    fn small_overlap_is_dropped_to_guarantee_progress() {
        let text: String = filler(5_000).into_iter().collect();
        let chunker = Chunker::new(1_000, 80).unwrap();
        let segments = chunker.split(&text).unwrap();

        assert_eq!(segments.len(), 5);
        for segment in &segments {
            assert_eq!(segment.overlap_with_previous(), 0);
            assert_eq!(segment.overlap_with_next(), 0);
        }
        assert_eq!(reconstruct(&segments), text);
    }

    #[test]
    fn boundaryless_text_terminates_in_linear_iterations() {
        let len = 200_000;
        let text: String = filler(len).into_iter().collect();
        let chunker = Chunker::new(10_000, 500).unwrap();
        let plan = chunker.plan(&text).unwrap();

        let bound = len / (10_000 - 500) + 2;
        assert!(
            plan.stats.iterations <= bound,
            "{} iterations, bound {}",
            plan.stats.iterations,
            bound
        );
        assert_eq!(plan.stats.iterations, plan.segments.len());
        assert_eq!(reconstruct(&plan.segments), text);
    }

    #[test]
    fn largest_allowed_overlap_keeps_iterations_linear() {
        let len = 200_000;
        let text: String = filler(len).into_iter().collect();
        let chunker = Chunker::new(1_000, 500).unwrap();
        assert!(Chunker::new(1_000, 501).is_err());
        let plan = chunker.plan(&text).unwrap();

        // Each cut advances at least target / 2.
        let bound = 2 * len / 1_000 + 2;
        assert!(
            plan.stats.iterations <= bound,
            "{} iterations, bound {}",
            plan.stats.iterations,
            bound
        );
        assert_eq!(reconstruct(&plan.segments), text);
    }

    #[test]
    fn oversized_segment_is_split_at_interior_point() {
        // Only paragraph break sits 450 past the target, forcing an 852-char
        // cut; a sentence end 10 before the midpoint allows a secondary split.
        let mut text = filler(1_500);
        text[850] = '\n';
        text[851] = '\n';
        text[416] = '.';
        text[417] = ' ';
        let source: String = text.iter().collect();

        let chunker = Chunker::new(400, 150).unwrap();
        let plan = chunker.plan(&source).unwrap();

        assert!(plan.stats.oversize_splits >= 1);
        assert_eq!(plan.segments[0].char_count(), 418);
        assert_eq!(plan.segments[1].start(), 418 - 150);
        assert_eq!(plan.segments[1].overlap_with_previous(), 150);
        assert_eq!(reconstruct(&plan.segments), source);
    }

    #[test]
    fn oversized_segment_without_interior_split_is_kept() {
        // The midpoint search only finds a break 28 chars in, too close to the edge.
        let mut text = filler(1_500);
        text[850] = '\n';
        text[851] = '\n';
        text[26] = '\n';
        text[27] = '\n';
        let source: String = text.iter().collect();

        let chunker = Chunker::new(400, 150).unwrap();
        let plan = chunker.plan(&source).unwrap();

        assert_eq!(plan.stats.oversized_kept, 1);
        assert_eq!(plan.segments[0].char_count(), 852);
        assert_eq!(reconstruct(&plan.segments), source);
    }

    #[test]
    fn multibyte_text_reconstructs_exactly() {
        let sentence = "Größe und Übermaß – 日本語のテキスト. ";
        let text = sentence.repeat(400);
        let chunker = Chunker::new(1_500, 200).unwrap();
        let segments = chunker.split(&text).unwrap();

        assert!(segments.len() > 1);
        assert_eq!(reconstruct(&segments), text);
    }

    #[test]
    fn fifty_thousand_chars_make_two_segments() {
        let sentence = "This is a line of transcript text that keeps going on. ";
        let mut text = sentence.repeat(50_000 / sentence.len() + 1);
        text.truncate(50_000);

        let chunker = Chunker::new(35_000, 500).unwrap();
        let segments = chunker.split(&text).unwrap();

        assert_eq!(segments.len(), 2);
        assert!(segments[0].char_count().abs_diff(35_000) <= 500);
        assert_eq!(segments[0].overlap_with_next(), 500);
        assert_eq!(segments[1].overlap_with_previous(), 500);
        assert_eq!(segments[1].end(), 50_000);
        assert_eq!(reconstruct(&segments), text);
    }
}
