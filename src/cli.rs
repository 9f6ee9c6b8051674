//! Command-line interface for scriptsmith
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Turn raw transcripts into structured notes with an LLM
#[derive(Parser, Debug)]
#[command(
    name = "scriptsmith",
    version,
    about = "Turn raw transcripts into structured notes with an LLM",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Transcript file to process
    #[arg(value_name = "TRANSCRIPT")]
    pub transcript: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// System prompt file
    #[arg(long, short = 'p', value_name = "PATH", default_value = crate::defaults::PROMPT_FILE)]
    pub prompt: PathBuf,

    /// Output file (default: <name>_processed.txt next to the transcript)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Model identifier (overrides config), e.g. gpt-4o
    #[arg(long, short = 'm', value_name = "MODEL")]
    pub model: Option<String>,

    /// Maximum segments processed at once (1-10)
    #[arg(long, short = 'j', value_name = "N", value_parser = clap::value_parser!(u8).range(1..=10))]
    pub concurrency: Option<u8>,

    /// Per-call timeout. Examples: 90, 90s, 2m, 1m30s
    #[arg(long, short = 't', value_name = "DURATION", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Also write the job summary as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: progress, -vv: per-segment diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a timeout string.
///
/// Supports any duration format accepted by `humantime`: bare numbers (seconds),
/// single-unit (`30s`, `5m`) and compound (`1m30s`).
fn parse_timeout(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration (file, environment, defaults)
    Show,
    /// Print the configuration file path
    Path,
}
