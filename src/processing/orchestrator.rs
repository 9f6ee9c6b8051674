//! Drives one document through strategy selection, dispatch and merging.

use crate::config::Config;
use crate::document::Document;
use crate::error::{Result, ScriptsmithError};
use crate::llm::{TextGenerator, TokenUsage};
use crate::processing::chunker::Chunker;
use crate::processing::controller::ConcurrencyController;
use crate::processing::dispatch::{DispatchSettings, DispatchWorker};
use crate::processing::merger::merge;
use crate::processing::strategy::{ProcessingStrategy, StrategySelector};
use crate::processing::types::{AggregateResult, Segment, SegmentResult, size_ratio};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Where a processing run currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingState {
    Idle,
    StrategyChosen(ProcessingStrategy),
    SingleDispatch,
    ChunkDispatch { segments: usize },
    Merging,
    Complete,
    Failed,
}

impl ProcessingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::StrategyChosen(strategy) => write!(f, "strategy_chosen({strategy})"),
            Self::SingleDispatch => write!(f, "single_dispatch"),
            Self::ChunkDispatch { segments } => write!(f, "chunk_dispatch({segments})"),
            Self::Merging => write!(f, "merging"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Receives every state transition of a processing run.
pub trait StateObserver: Send + Sync {
    fn on_transition(&self, from: &ProcessingState, to: &ProcessingState);

    /// Called once before the transition to [`ProcessingState::Failed`].
    fn on_failure(&self, _state: &ProcessingState, _error: &ScriptsmithError) {}
}

/// Observer that writes transitions to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl StateObserver for LogObserver {
    fn on_transition(&self, from: &ProcessingState, to: &ProcessingState) {
        tracing::debug!(from = %from, to = %to, "Processing state changed");
    }

    fn on_failure(&self, state: &ProcessingState, error: &ScriptsmithError) {
        tracing::error!(
            state = %state,
            segment_index = error.segment_index(),
            error = %error,
            "Processing failed"
        );
    }
}

/// Composes the processing stages for one configured service.
pub struct Orchestrator {
    selector: StrategySelector,
    chunker: Chunker,
    controller: ConcurrencyController,
    worker: Arc<DispatchWorker>,
    observer: Arc<dyn StateObserver>,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        selector: StrategySelector,
        chunker: Chunker,
        controller: ConcurrencyController,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            selector,
            chunker,
            controller,
            worker: Arc::new(DispatchWorker::new(generator, settings)),
            observer: Arc::new(LogObserver),
        }
    }

    /// Build every stage from a validated config.
    pub fn from_config(
        config: &Config,
        generator: Arc<dyn TextGenerator>,
        system_prompt: impl Into<String>,
    ) -> Result<Self> {
        config.validate()?;
        let processing = &config.processing;
        Ok(Self::new(
            generator,
            processing.strategy_selector(),
            processing.chunker()?,
            processing.controller()?,
            config.dispatch_settings(system_prompt)?,
        ))
    }

    /// Replace the default logging observer.
    pub fn with_observer(mut self, observer: Arc<dyn StateObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Process `document` end to end.
    ///
    /// Any error leaves the run in [`ProcessingState::Failed`] and is returned
    /// unchanged; no partial output is produced.
    pub async fn process(&self, document: &Document) -> Result<AggregateResult> {
        let started = Instant::now();
        let mut state = ProcessingState::Idle;

        match self.run(document, &mut state, started).await {
            Ok(result) => Ok(result),
            Err(error) => {
                self.observer.on_failure(&state, &error);
                self.transition(&mut state, ProcessingState::Failed);
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        document: &Document,
        state: &mut ProcessingState,
        started: Instant,
    ) -> Result<AggregateResult> {
        if document.is_empty() {
            return Err(ScriptsmithError::Chunking {
                message: "document is empty".to_string(),
            });
        }

        let source_chars = document.char_count();
        let strategy = self.selector.select(source_chars);
        self.transition(state, ProcessingState::StrategyChosen(strategy));

        let (merged_text, segment_results, total_usage, api_calls) = match strategy {
            ProcessingStrategy::SinglePass => {
                self.transition(state, ProcessingState::SingleDispatch);
                let segment = Segment::new(0, 0, document.text().to_string());
                let result = self.worker.dispatch(segment, 1).await?;

                self.transition(state, ProcessingState::Merging);
                let results = [result];
                let (usage, calls) = totals(&results);
                (merge(&results), None, usage, calls)
            }
            ProcessingStrategy::ChunkedConcurrent { estimated_segments } => {
                let plan = self.chunker.plan(document.text())?;
                if plan.segments.len() != estimated_segments {
                    tracing::debug!(
                        estimated_segments,
                        actual_segments = plan.segments.len(),
                        "Segment estimate differs from chunker output"
                    );
                }

                self.transition(
                    state,
                    ProcessingState::ChunkDispatch {
                        segments: plan.segments.len(),
                    },
                );
                let results = self
                    .controller
                    .run(Arc::clone(&self.worker), plan.segments)
                    .await?;

                self.transition(state, ProcessingState::Merging);
                let (usage, calls) = totals(&results);
                (merge(&results), Some(results), usage, calls)
            }
        };

        let merged_chars = merged_text.chars().count();
        let result = AggregateResult {
            strategy,
            segment_results,
            total_usage,
            total_elapsed: started.elapsed(),
            source_chars,
            size_ratio: size_ratio(merged_chars, source_chars),
            api_calls,
            merged_text,
        };
        self.transition(state, ProcessingState::Complete);

        tracing::info!(
            strategy = %result.strategy,
            segments = result.segment_count(),
            source_chars,
            merged_chars,
            size_ratio = result.size_ratio,
            total_tokens = result.total_usage.total_tokens,
            api_calls,
            elapsed_ms = result.total_elapsed.as_millis() as u64,
            "Processing completed"
        );
        Ok(result)
    }

    fn transition(&self, state: &mut ProcessingState, next: ProcessingState) {
        self.observer.on_transition(state, &next);
        *state = next;
    }
}

/// Summed token usage and service calls of `results`.
fn totals(results: &[SegmentResult]) -> (TokenUsage, u32) {
    let usage = results.iter().map(SegmentResult::usage).sum();
    let calls = results.iter().map(SegmentResult::attempts).sum();
    (usage, calls)
}
