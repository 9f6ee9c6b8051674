//! Text-generation service abstraction.
//!
//! The processing engine only talks to [`TextGenerator`]; the HTTP backend
//! lives behind the `openai` feature.

pub mod generator;
#[cfg(feature = "openai")]
pub mod openai;

pub use generator::{
    GenerationError, GenerationRequest, GenerationResponse, MockGenerator, TextGenerator,
    TokenUsage,
};
#[cfg(feature = "openai")]
pub use openai::OpenAiGenerator;
