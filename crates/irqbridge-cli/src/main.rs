//! irqbridge - run Lua interrupt handlers against a simulated board
//!
//! # Configuration
//!
//! Settings are resolved with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Config file given with `--config`
//! 3. Default values (lowest priority)
//!
//! Without a config file no event sources run; the script can still poll
//! flags and register handlers.

mod config;
mod runner;

use anyhow::{Context, Result};
use clap::Parser;
use config::AppConfig;
use irqbridge_core::OverflowPolicy;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// irqbridge - run Lua interrupt handlers against a simulated board
#[derive(Parser, Debug)]
#[command(name = "irqbridge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Run configuration (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the overflow reporting policy (per-event, coalesced)
    #[arg(long, value_name = "POLICY")]
    overflow_policy: Option<OverflowPolicy>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Lua script to run
    script: PathBuf,
}

impl Args {
    fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(policy) = self.overflow_policy {
            config.bridge.overflow_policy = policy;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Terminal filter: --debug > --verbose > RUST_LOG env > default "warn".
    // Logs go to stderr so stdout carries script output and the summary.
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();

    let config = args.resolve_config()?;
    tracing::debug!(?config, "resolved configuration");

    let summary = runner::run(&config, &args.script)?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
        println!("{json}");
    } else {
        println!("{summary}");
    }
    Ok(())
}
