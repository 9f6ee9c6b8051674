//! Sends one segment to the text generator, with timeout and retry.

use crate::defaults;
use crate::error::{Result, ScriptsmithError};
use crate::llm::{GenerationError, GenerationRequest, GenerationResponse, TextGenerator};
use crate::processing::types::{Segment, SegmentResult};
use crate::prompt::annotate_for_segment;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bounded exponential backoff for retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first call, so it must be at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(ScriptsmithError::ConfigInvalidValue {
                key: "max_retries".to_string(),
                message: "at least one attempt is required".to_string(),
            });
        }
        if base_delay > max_delay {
            return Err(ScriptsmithError::ConfigInvalidValue {
                key: "retry_delay_secs".to_string(),
                message: format!("{base_delay:?} exceeds the maximum delay {max_delay:?}"),
            });
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_RETRIES,
            base_delay: Duration::from_secs(defaults::RETRY_DELAY_SECS),
            max_delay: Duration::from_secs(defaults::MAX_RETRY_DELAY_SECS),
        }
    }
}

/// Everything a worker needs besides the segment itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
    pub min_result_chars: usize,
    pub retry: RetryPolicy,
}

impl DispatchSettings {
    /// Settings with the default generation parameters.
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            temperature: defaults::TEMPERATURE,
            max_output_tokens: defaults::MAX_OUTPUT_TOKENS,
            timeout: Duration::from_secs(defaults::API_TIMEOUT_SECS),
            min_result_chars: defaults::MIN_RESULT_CHARS,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_min_result_chars(mut self, min_result_chars: usize) -> Self {
        self.min_result_chars = min_result_chars;
        self
    }
}

/// Processes segments one call at a time against a shared generator.
pub struct DispatchWorker {
    generator: Arc<dyn TextGenerator>,
    settings: DispatchSettings,
}

impl DispatchWorker {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: DispatchSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Process `segment`, one of `total`, retrying transient failures.
    ///
    /// Fatal failures and exhausted retries become [`ScriptsmithError::Dispatch`];
    /// output below the minimum length becomes [`ScriptsmithError::Validation`].
    pub async fn dispatch(&self, segment: Segment, total: usize) -> Result<SegmentResult> {
        let index = segment.index();
        let request = self.request_for(&segment, total);
        let retry = self.settings.retry;
        let started = Instant::now();

        tracing::debug!(
            segment_index = index,
            char_count = segment.char_count(),
            generator = self.generator.name(),
            "Dispatching segment"
        );

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.call(&request).await {
                Ok(response) => break response,
                Err(error) if error.is_retryable() && attempt < retry.max_attempts() => {
                    let delay = retry.delay_for(attempt);
                    tracing::warn!(
                        segment_index = index,
                        attempt,
                        max_attempts = retry.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Segment call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    tracing::error!(
                        segment_index = index,
                        attempt,
                        retryable = error.is_retryable(),
                        error = %error,
                        "Segment failed"
                    );
                    return Err(ScriptsmithError::Dispatch {
                        index,
                        attempts: attempt,
                        source: error,
                    });
                }
            }
        };

        let elapsed = started.elapsed();
        let result = SegmentResult::new(
            segment,
            response.text,
            response.usage,
            elapsed,
            attempt,
            self.settings.min_result_chars,
        )
        .inspect_err(|error| {
            tracing::error!(segment_index = index, error = %error, "Segment result rejected");
        })?;

        tracing::info!(
            segment_index = index,
            attempts = attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            output_chars = result.text().chars().count(),
            total_tokens = result.usage().total_tokens,
            "Segment processed"
        );
        Ok(result)
    }

    fn request_for(&self, segment: &Segment, total: usize) -> GenerationRequest {
        GenerationRequest {
            model: self.settings.model.clone(),
            system_prompt: annotate_for_segment(&self.settings.system_prompt, segment.index(), total),
            user_text: segment.text().to_string(),
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_output_tokens,
            timeout: self.settings.timeout,
        }
    }

    /// One generator call bounded by the configured timeout.
    async fn call(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResponse, GenerationError> {
        match tokio::time::timeout(self.settings.timeout, self.generator.generate(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(GenerationError::Timeout(self.settings.timeout)),
        }
    }
}
