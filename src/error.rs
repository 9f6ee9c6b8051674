//! Error types for scriptsmith.

use crate::llm::GenerationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptsmithError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // System prompt errors
    #[error("System prompt not found at {path}")]
    PromptNotFound { path: String },

    #[error("System prompt too short: {length} characters (minimum {minimum})")]
    PromptTooShort { length: usize, minimum: usize },

    // Processing errors
    #[error("Chunking failed: {message}")]
    Chunking { message: String },

    #[error("Segment {index} failed after {attempts} attempt(s): {source}")]
    Dispatch {
        index: usize,
        attempts: u32,
        #[source]
        source: GenerationError,
    },

    #[error("Segment {index} result too short: {length} characters (minimum {minimum})")]
    Validation {
        index: usize,
        length: usize,
        minimum: usize,
    },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl ScriptsmithError {
    /// Index of the segment that caused this error, if it is segment-scoped.
    pub fn segment_index(&self) -> Option<usize> {
        match self {
            Self::Dispatch { index, .. } | Self::Validation { index, .. } => Some(*index),
            _ => None,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScriptsmithError>;
