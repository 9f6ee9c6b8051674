//! Chunking, bounded-concurrency dispatch and merging of transcripts.
//!
//! A document is either sent whole to the text generator or split into
//! overlapping segments that are processed concurrently and merged back in
//! order. [`Orchestrator`] ties the stages together.

pub mod chunker;
pub mod controller;
pub mod dispatch;
pub mod merger;
pub mod orchestrator;
pub mod strategy;
pub mod types;

pub use chunker::{ChunkPlan, ChunkStats, Chunker, find_split_point};
pub use controller::ConcurrencyController;
pub use dispatch::{DispatchSettings, DispatchWorker, RetryPolicy};
pub use merger::{merge, merge_texts};
pub use orchestrator::{LogObserver, Orchestrator, ProcessingState, StateObserver};
pub use strategy::{ProcessingStrategy, StrategySelector};
pub use types::{AggregateResult, Segment, SegmentResult, size_ratio};
