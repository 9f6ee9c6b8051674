//! scriptsmith - Refine long transcripts through a text-generation service
//!
//! Splits large transcripts into overlapping segments, processes them
//! concurrently under a bounded limit and merges the results in order.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod document;
pub mod error;
pub mod llm;
pub mod output;
pub mod processing;
pub mod prompt;
pub mod report;

// Composition root - needs the CLI stack
#[cfg(feature = "cli")]
pub mod app;

// Core types
pub use document::Document;
pub use llm::{GenerationError, GenerationRequest, GenerationResponse, TextGenerator, TokenUsage};
pub use processing::{
    AggregateResult, Chunker, ConcurrencyController, DispatchSettings, DispatchWorker,
    Orchestrator, ProcessingState, ProcessingStrategy, RetryPolicy, Segment, SegmentResult,
    StateObserver, StrategySelector,
};

// Error handling
pub use error::{Result, ScriptsmithError};

// Config
pub use config::{Config, ProcessingConfig, ServiceConfig};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
