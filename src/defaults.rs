//! Default configuration constants for scriptsmith.
//!
//! Shared by the configuration layer and the processing engine so both agree
//! on the same baseline values.

/// Default model identifier sent to the text-generation service.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default base URL of the OpenAI-compatible API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default per-call timeout in seconds.
pub const API_TIMEOUT_SECS: u64 = 120;

/// Sampling temperature used for every call.
///
/// Kept low so that formatting stays consistent between segments.
pub const TEMPERATURE: f32 = 0.3;

/// Upper bound on output tokens requested per call.
pub const MAX_OUTPUT_TOKENS: u32 = 16_384;

/// Documents longer than this many characters are split into segments.
pub const CHUNKING_THRESHOLD: usize = 20_000;

/// Target segment size in characters.
pub const CHUNK_SIZE: usize = 35_000;

/// Characters shared between adjacent segments.
pub const CHUNK_OVERLAP: usize = 500;

/// Maximum number of service calls in flight at once.
pub const MAX_CONCURRENT_CHUNKS: usize = 3;

/// Maximum dispatch attempts per segment (first try included).
pub const MAX_RETRIES: u32 = 3;

/// Base delay between attempts, in seconds. Doubles on each retry.
pub const RETRY_DELAY_SECS: u64 = 1;

/// Ceiling for the exponential backoff, in seconds.
pub const MAX_RETRY_DELAY_SECS: u64 = 60;

/// Results shorter than this (after trimming) indicate a silent service failure.
pub const MIN_RESULT_CHARS: usize = 10;

/// System prompts shorter than this are rejected.
pub const MIN_PROMPT_CHARS: usize = 50;

/// Default system prompt file, relative to the working directory.
pub const PROMPT_FILE: &str = "system_prompt.md";
