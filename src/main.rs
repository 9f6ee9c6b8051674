use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use scriptsmith::app::{ProcessOptions, check_transcript, run_process_command};
use scriptsmith::cli::{Cli, Commands, ConfigAction};
use scriptsmith::config::Config;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    tracing::debug!(version = %scriptsmith::version_string(), "Starting scriptsmith");

    match cli.command {
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "scriptsmith",
                &mut std::io::stdout(),
            );
        }
        None => {
            let Some(transcript) = cli.transcript else {
                Cli::command().print_help()?;
                std::process::exit(2);
            };
            check_transcript(&transcript)?;

            let config = load_config(cli.config.as_deref())?;
            let options = ProcessOptions {
                transcript,
                prompt: cli.prompt,
                output: cli.output,
                model: cli.model,
                concurrency: cli.concurrency.map(usize::from),
                timeout: cli.timeout,
                summary_json: cli.summary_json,
                quiet: cli.quiet,
            };
            run_process_command(config, options)
                .await
                .context("Transcript processing failed")?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise -q, -v and -vv pick the level.
fn init_logging(quiet: bool, verbose: u8) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scriptsmith={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/scriptsmith/config.toml)
/// 3. Built-in defaults
///
/// Environment variable overrides are applied on top of all three.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides()?)
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            let rendered =
                toml::to_string_pretty(&config.redacted()).context("Failed to render config")?;
            print!("{rendered}");
            if let Err(e) = config.validate() {
                eprintln!("Warning: {e}");
            }
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
