//! Job summary and cost estimate for a finished run.

use crate::document::Document;
use crate::processing::AggregateResult;
use serde::Serialize;

/// USD price per one million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_million
            + output_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// Published pricing for the models this tool is usually run with.
pub fn pricing_for(model: &str) -> Option<ModelPricing> {
    match model {
        "gpt-4o" => Some(ModelPricing::new(2.50, 10.00)),
        "gpt-4o-mini" => Some(ModelPricing::new(0.15, 0.60)),
        "gpt-4-turbo" => Some(ModelPricing::new(10.00, 30.00)),
        "gpt-3.5-turbo" => Some(ModelPricing::new(0.50, 1.50)),
        _ => None,
    }
}

/// Estimated USD cost; unknown models cost nothing.
pub fn estimate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    pricing_for(model).map_or(0.0, |pricing| pricing.cost(input_tokens, output_tokens))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Metrics for one processed transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub model: String,
    pub strategy: String,
    pub segments: usize,
    pub source_chars: usize,
    pub source_words: usize,
    pub output_chars: usize,
    pub output_words: usize,
    pub content_preservation_percent: f64,
    pub compression_ratio_percent: f64,
    pub api_calls: u32,
    pub retry_count: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
    pub elapsed_secs: f64,
}

impl JobSummary {
    pub fn new(document: &Document, result: &AggregateResult, model: &str) -> Self {
        let segments = result.segment_count();
        let output_chars = result.merged_chars();
        let preservation = if document.char_count() == 0 {
            100.0
        } else {
            output_chars as f64 / document.char_count() as f64 * 100.0
        };
        let usage = result.total_usage;

        Self {
            model: model.to_string(),
            strategy: result.strategy.to_string(),
            segments,
            source_chars: document.char_count(),
            source_words: document.word_count(),
            output_chars,
            output_words: result.merged_text.split_whitespace().count(),
            content_preservation_percent: round1(preservation),
            compression_ratio_percent: round1(100.0 - preservation),
            api_calls: result.api_calls,
            retry_count: result.api_calls.saturating_sub(segments as u32),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
            estimated_cost_usd: estimate_cost(model, usage.input_tokens, usage.output_tokens),
            elapsed_secs: result.total_elapsed.as_secs_f64(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text block for the terminal.
    pub fn render(&self) -> String {
        [
            format!("Model:        {}", self.model),
            format!("Strategy:     {} ({} segment(s))", self.strategy, self.segments),
            format!(
                "Input:        {} chars, {} words",
                self.source_chars, self.source_words
            ),
            format!(
                "Output:       {} chars, {} words",
                self.output_chars, self.output_words
            ),
            format!(
                "Preserved:    {:.1}% (compression {:.1}%)",
                self.content_preservation_percent, self.compression_ratio_percent
            ),
            format!("API calls:    {} ({} retries)", self.api_calls, self.retry_count),
            format!(
                "Tokens:       {} in / {} out / {} total",
                self.input_tokens, self.output_tokens, self.total_tokens
            ),
            format!("Cost:         ${:.4}", self.estimated_cost_usd),
            format!("Elapsed:      {:.1}s", self.elapsed_secs),
        ]
        .join("\n")
    }
}
