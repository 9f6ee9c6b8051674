//! OpenAI-compatible chat completions backend.
//!
//! Posts to `{base_url}/chat/completions` and maps HTTP failures onto
//! [`GenerationError`] so the dispatch layer can decide what to retry.

use crate::llm::generator::{
    GenerationError, GenerationRequest, GenerationResponse, TextGenerator, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// Text generator backed by an OpenAI-compatible HTTP API.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiGenerator {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Map a non-success HTTP status onto a generation error.
fn classify_status(status: u16, body: &str) -> GenerationError {
    match status {
        429 => GenerationError::RateLimited(body.to_string()),
        // Request Timeout / Gateway Timeout are timeouts reported by the server side.
        408 | 504 => GenerationError::Timeout(std::time::Duration::ZERO),
        _ => GenerationError::Service(format!("HTTP {status}: {body}")),
    }
}

/// Extract text and usage from a chat completions payload.
fn parse_chat_response(body: &str) -> Result<GenerationResponse, GenerationError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Service(format!("Failed to parse response: {e}")))?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.is_empty())
        .ok_or(GenerationError::EmptyResponse)?;

    let usage = parsed
        .usage
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens, u.total_tokens))
        .unwrap_or_default();

    Ok(GenerationResponse { text, usage })
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_text,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };
        let payload = serde_json::to_string(&body)
            .map_err(|e| GenerationError::Service(format!("Failed to encode request: {e}")))?;

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .timeout(request.timeout)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(request.timeout)
                } else {
                    GenerationError::Service(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(request.timeout)
            } else {
                GenerationError::Service(format!("Failed to read response: {e}"))
            }
        })?;

        if !status.is_success() {
            return Err(match classify_status(status.as_u16(), &text) {
                GenerationError::Timeout(_) => GenerationError::Timeout(request.timeout),
                other => other,
            });
        }

        parse_chat_response(&text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
