//! Lectern - classroom session and cache core
//!
//! Main entry point for the Lectern CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;

mod commands;
mod services;

use commands::{config, simulate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Lectern - classroom session and cache core
#[derive(Parser)]
#[command(name = "lectern")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file layered on top of the discovered ones
    #[arg(long, global = true, env = "LECTERN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configuration management
    Config(config::ConfigArgs),

    /// Run a classroom workload against an in-process registry and cache
    Simulate(simulate::SimulateArgs),
}

/// Filter used with `--verbose` when `RUST_LOG` is unset.
const VERBOSE_FILTER: &str =
    "lectern=debug,lectern_session=debug,lectern_cache=debug,lectern_config=debug,info";

/// Filter for the rolling log file.
const FILE_FILTER: &str =
    "lectern=trace,lectern_session=trace,lectern_cache=trace,lectern_config=trace,info";

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loaded = lectern_config::load_config(None)?;
    if let Some(path) = &cli.config {
        let layer = lectern_config::load_config_file(path)
            .with_context(|| format!("loading --config {}", path.display()))?;
        loaded.config.merge(layer);
        loaded.sources.push(lectern_config::ConfigSource {
            path: path.clone(),
            loaded: true,
        });
    }

    let _guard = init_tracing(cli.verbose, &loaded.config.logging());
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        loaded,
    };

    match cli.command {
        Commands::Config(args) => config::run(args, &ctx).await,
        Commands::Simulate(args) => simulate::run(args, &ctx).await,
    }
}

/// Console logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool, logging: &lectern_config::LoggingConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let directive = if verbose {
        VERBOSE_FILTER.to_string()
    } else if logging.level.contains('=') {
        logging.level.clone()
    } else {
        let level = &logging.level;
        format!(
            "lectern={level},lectern_session={level},lectern_cache={level},lectern_config={level},warn"
        )
    };
    let console_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let (text_layer, json_layer) = if logging.json {
        let layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter());
        (None, Some(layer))
    } else {
        let layer = fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(console_filter());
        (Some(layer), None)
    };

    let (file_layer, guard) = match &logging.file_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "lectern.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    guard
}
