//! Single-pass vs chunked processing decision.

use serde::Serialize;
use std::fmt;

/// Processing path chosen for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ProcessingStrategy {
    /// The whole document goes to the service in one call.
    SinglePass,
    /// The document is split and the segments are dispatched concurrently.
    ///
    /// The estimate is advisory; the chunker may produce a different count.
    ChunkedConcurrent { estimated_segments: usize },
}

impl ProcessingStrategy {
    pub fn requires_chunking(&self) -> bool {
        matches!(self, Self::ChunkedConcurrent { .. })
    }
}

impl fmt::Display for ProcessingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SinglePass => write!(f, "single_pass"),
            Self::ChunkedConcurrent { .. } => write!(f, "chunked_concurrent"),
        }
    }
}

/// Picks a [`ProcessingStrategy`] from document size alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategySelector {
    threshold: usize,
    target_size: usize,
    overlap: usize,
}

impl StrategySelector {
    pub fn new(threshold: usize, target_size: usize, overlap: usize) -> Self {
        Self {
            threshold,
            target_size,
            overlap,
        }
    }

    pub fn select(&self, char_count: usize) -> ProcessingStrategy {
        let strategy = if char_count <= self.threshold {
            ProcessingStrategy::SinglePass
        } else {
            ProcessingStrategy::ChunkedConcurrent {
                estimated_segments: self.estimate_segments(char_count),
            }
        };

        tracing::info!(
            char_count,
            threshold = self.threshold,
            strategy = %strategy,
            "Processing strategy selected"
        );
        strategy
    }

    /// `max(1, ceil((length - overlap) / (target - overlap)))`.
    fn estimate_segments(&self, char_count: usize) -> usize {
        let stride = self.target_size.saturating_sub(self.overlap).max(1);
        char_count
            .saturating_sub(self.overlap)
            .div_ceil(stride)
            .max(1)
    }
}
