//! Source document handed to the processing engine.

use crate::error::Result;
use std::path::Path;

/// Immutable transcript text plus its length in characters.
///
/// Lengths are counted in Unicode scalar values so that thresholds and
/// segment sizes mean the same thing for any script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    char_count: usize,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let char_count = text.chars().count();
        Self { text, char_count }
    }

    /// Read a UTF-8 transcript from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(text))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.char_count
    }

    pub fn is_empty(&self) -> bool {
        self.char_count == 0
    }

    /// Whitespace-separated word count.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}
