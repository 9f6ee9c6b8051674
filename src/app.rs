//! Transcript processing entry point.
//!
//! Orchestrates the complete flow:
//! load prompt → read transcript → process → write output → report

use crate::config::Config;
use crate::document::Document;
use crate::error::{Result, ScriptsmithError};
use crate::llm::TextGenerator;
use crate::output::{processed_output_path, write_summary_json, write_text};
use crate::processing::{AggregateResult, Orchestrator};
use crate::prompt::load_system_prompt;
use crate::report::JobSummary;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Per-invocation options from the command line.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub transcript: PathBuf,
    pub prompt: PathBuf,
    pub output: Option<PathBuf>,
    pub model: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout: Option<Duration>,
    pub summary_json: Option<PathBuf>,
    pub quiet: bool,
}

/// What a finished run produced.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub output_path: PathBuf,
    pub result: AggregateResult,
    pub summary: JobSummary,
}

/// Apply command-line overrides on top of the loaded config.
pub fn apply_overrides(mut config: Config, options: &ProcessOptions) -> Config {
    if let Some(model) = &options.model {
        config.service.model = model.clone();
    }
    if let Some(limit) = options.concurrency {
        config.processing.max_concurrent_chunks = limit;
    }
    if let Some(timeout) = options.timeout {
        config.service.timeout_secs = timeout.as_secs();
    }
    config
}

/// Process one transcript file with the given generator.
///
/// The config must already carry every override; it is validated here.
pub async fn process_file(
    config: &Config,
    options: &ProcessOptions,
    generator: Arc<dyn TextGenerator>,
) -> Result<ProcessOutcome> {
    config.validate()?;

    let system_prompt = load_system_prompt(&options.prompt)?;
    let document = Document::from_file(&options.transcript)?;
    tracing::info!(
        path = %options.transcript.display(),
        chars = document.char_count(),
        words = document.word_count(),
        "Transcript loaded"
    );

    let orchestrator = Orchestrator::from_config(config, generator, system_prompt)?;
    let result = orchestrator.process(&document).await?;

    let output_path = options
        .output
        .clone()
        .unwrap_or_else(|| processed_output_path(&options.transcript));
    write_text(&output_path, &result.merged_text)?;

    let summary = JobSummary::new(&document, &result, &config.service.model);
    if let Some(path) = &options.summary_json {
        write_summary_json(path, &summary)?;
    }

    Ok(ProcessOutcome {
        output_path,
        result,
        summary,
    })
}

/// Run the default command against the configured OpenAI-compatible service.
#[cfg(feature = "openai")]
pub async fn run_process_command(config: Config, options: ProcessOptions) -> Result<()> {
    use crate::llm::OpenAiGenerator;

    let config = apply_overrides(config, &options);
    let api_key = config
        .service
        .api_key
        .clone()
        .ok_or_else(|| ScriptsmithError::ConfigInvalidValue {
            key: "service.api_key".to_string(),
            message: "not set (use SCRIPTSMITH_API_KEY or OPENAI_API_KEY)".to_string(),
        })?;

    let generator = Arc::new(OpenAiGenerator::new(&config.service.base_url, &api_key));
    let outcome = process_file(&config, &options, generator).await?;

    if !options.quiet {
        print_outcome(&outcome);
    }
    Ok(())
}

#[cfg(feature = "openai")]
fn print_outcome(outcome: &ProcessOutcome) {
    use owo_colors::OwoColorize;

    eprintln!(
        "{} {}",
        "Processed →".green().bold(),
        outcome.output_path.display()
    );
    eprintln!("{}", outcome.summary.render().dimmed());
}

/// Reject a transcript path that doesn't exist before any other work.
pub fn check_transcript(path: &std::path::Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ScriptsmithError::Other(format!(
            "Transcript not found: {}",
            path.display()
        )))
    }
}
