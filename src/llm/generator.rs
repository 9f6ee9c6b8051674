use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Token accounting reported by the service for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64, total_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// One call to the text-generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_text: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

/// Successful service response.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// Failure signals surfaced by a text-generation backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("service returned an empty response")]
    EmptyResponse,

    #[error("service error: {0}")]
    Service(String),
}

impl GenerationError {
    /// Timeouts and rate limits are transient; everything else is fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RateLimited(_))
    }
}

/// Trait for text-generation backends.
///
/// This trait allows swapping implementations (real HTTP client vs mock).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one generation request.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResponse, GenerationError>;

    /// Name of the backend, for logs.
    fn name(&self) -> &str;
}

/// Implement TextGenerator for Arc<T> to allow sharing across tasks.
#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResponse, GenerationError> {
        (**self).generate(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, Clone)]
enum MockReply {
    Fixed(String),
    Echo { prefix: String },
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    marker: String,
    remaining: u32,
    error: GenerationError,
}

/// Mock generator for testing.
///
/// Replies with a fixed text or echoes the user text, can sleep to simulate
/// latency, and can fail calls whose user text contains a marker a given
/// number of times. Records call counts and the peak number of concurrent
/// calls.
#[derive(Debug)]
pub struct MockGenerator {
    name: String,
    reply: MockReply,
    usage: TokenUsage,
    delay: Duration,
    always_fail: Option<GenerationError>,
    scripted: Mutex<Vec<ScriptedFailure>>,
    calls: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    attempts_by_marker: Mutex<HashMap<String, u32>>,
}

impl MockGenerator {
    /// Create a new mock generator with default settings
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reply: MockReply::Fixed("mock generated text".to_string()),
            usage: TokenUsage::new(100, 50, 150),
            delay: Duration::ZERO,
            always_fail: None,
            scripted: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            attempts_by_marker: Mutex::new(HashMap::new()),
        }
    }

    /// Always reply with `text`.
    pub fn with_response(mut self, text: &str) -> Self {
        self.reply = MockReply::Fixed(text.to_string());
        self
    }

    /// Reply with `prefix` followed by the request's user text.
    pub fn with_echo(mut self, prefix: &str) -> Self {
        self.reply = MockReply::Echo {
            prefix: prefix.to_string(),
        };
        self
    }

    /// Token usage reported for every successful call.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every call with `error`.
    pub fn with_failure(mut self, error: GenerationError) -> Self {
        self.always_fail = Some(error);
        self
    }

    /// Fail the first `times` calls whose user text contains `marker`.
    pub fn with_failures_for(self, marker: &str, times: u32, error: GenerationError) -> Self {
        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ScriptedFailure {
                marker: marker.to_string(),
                remaining: times,
                error,
            });
        self
    }

    /// Total number of calls received.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of calls whose user text contained `marker`.
    pub fn attempts_for(&self, marker: &str) -> u32 {
        self.attempts_by_marker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(marker)
            .copied()
            .unwrap_or(0)
    }

    fn record_marker_attempts(&self, user_text: &str) {
        let scripted = self.scripted.lock().unwrap_or_else(|e| e.into_inner());
        let mut attempts = self
            .attempts_by_marker
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for failure in scripted.iter() {
            if user_text.contains(&failure.marker) {
                *attempts.entry(failure.marker.clone()).or_insert(0) += 1;
            }
        }
    }

    fn scripted_failure(&self, user_text: &str) -> Option<GenerationError> {
        let mut scripted = self.scripted.lock().unwrap_or_else(|e| e.into_inner());
        scripted
            .iter_mut()
            .find(|f| f.remaining > 0 && user_text.contains(&f.marker))
            .map(|f| {
                f.remaining -= 1;
                f.error.clone()
            })
    }

    fn reply_for(&self, request: &GenerationRequest) -> String {
        match &self.reply {
            MockReply::Fixed(text) => text.clone(),
            MockReply::Echo { prefix } => format!("{prefix}{}", request.user_text),
        }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.record_marker_attempts(&request.user_text);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = if let Some(error) = &self.always_fail {
            Err(error.clone())
        } else if let Some(error) = self.scripted_failure(&request.user_text) {
            Err(error)
        } else {
            Ok(GenerationResponse {
                text: self.reply_for(request),
                usage: self.usage,
            })
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn name(&self) -> &str {
        &self.name
    }
}
