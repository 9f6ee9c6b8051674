//! Bounded-concurrency fan-out of segment dispatches.

use crate::error::{Result, ScriptsmithError};
use crate::processing::dispatch::DispatchWorker;
use crate::processing::types::{Segment, SegmentResult};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

/// Runs segment dispatches as tokio tasks, at most `limit` at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyController {
    limit: usize,
}

impl ConcurrencyController {
    /// Create a controller admitting at most `limit` dispatches at once.
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(ScriptsmithError::ConfigInvalidValue {
                key: "max_concurrent_chunks".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(Self { limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Dispatch every segment and return the results in segment order.
    ///
    /// The first failure is returned as soon as it arrives. Tasks already
    /// holding a slot finish on their own and their results are discarded;
    /// tasks still waiting for a slot never call the service.
    pub async fn run(
        &self,
        worker: Arc<DispatchWorker>,
        segments: Vec<Segment>,
    ) -> Result<Vec<SegmentResult>> {
        let total = segments.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        tracing::info!(
            segment_count = total,
            max_concurrent = self.limit,
            "Dispatching segments"
        );

        let semaphore = Arc::new(Semaphore::new(self.limit));
        let (tx, mut rx) = mpsc::channel::<(usize, Result<SegmentResult>)>(total);

        for segment in segments {
            let worker = Arc::clone(&worker);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            tokio::spawn(async move {
                let index = segment.index();
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => worker.dispatch(segment, total).await,
                    Err(_) => {
                        tracing::debug!(segment_index = index, "Dispatch cancelled after earlier failure");
                        Err(ScriptsmithError::Other(format!(
                            "Segment {index} was cancelled before dispatch"
                        )))
                    }
                };
                if tx.send((index, outcome)).await.is_err() {
                    tracing::debug!(segment_index = index, "Result discarded after earlier failure");
                }
            });
        }
        drop(tx);

        let mut slots: Vec<Option<SegmentResult>> = (0..total).map(|_| None).collect();
        while let Some((index, outcome)) = rx.recv().await {
            match outcome {
                Ok(result) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(result);
                    }
                }
                Err(error) => {
                    tracing::error!(
                        segment_index = index,
                        error = %error,
                        "Segment failed, abandoning remaining results"
                    );
                    // Waiting tasks see a closed semaphore and skip their dispatch.
                    semaphore.close();
                    return Err(error);
                }
            }
        }

        // Every sender is dropped; a missing slot means its task died without reporting.
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    ScriptsmithError::Other(format!("Segment {index} task ended without a result"))
                })
            })
            .collect()
    }
}
