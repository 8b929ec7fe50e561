//! cdsync CLI - one-way image sync to a cloud drive
//!
//! Provides commands for:
//! - Synchronizing a local picture directory
//! - Logging in and out of the drive
//! - Showing and validating the configuration
//! - Generating shell completions

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use cdsync_core::config::Config;
use commands::{
    auth::AuthCommand, completions::CompletionsCommand, config::ConfigCommand, sync::SyncCommand,
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "cdsync", version, about = "One-way image sync to a cloud drive")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload new local images and create missing folders
    Sync(SyncCommand),
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config_path: PathBuf,
}

/// Tracing filter directive when `RUST_LOG` is not set
fn filter_directive(verbose: u8, quiet: bool, configured: &str) -> String {
    match (quiet, verbose) {
        (true, 0) => "warn".to_string(),
        (_, 0) => configured.to_string(),
        (_, 1) => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn init_tracing(cli: &Cli, config_path: &std::path::Path) {
    let configured = Config::load(config_path)
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".to_string());
    let directive = filter_directive(cli.verbose, cli.quiet, &configured);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, ctx: Context) -> Result<()> {
    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Auth(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    init_tracing(&cli, &config_path);

    let ctx = Context {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        quiet: cli.quiet,
        config_path,
    };
    let formatter = get_formatter(ctx.format, ctx.quiet);

    match run(cli, ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
