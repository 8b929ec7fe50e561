//! Sync command - upload new local images to the drive
//!
//! Provides the `cdsync sync` CLI command which:
//! 1. Loads the configuration and applies command-line overrides
//! 2. Resolves the refresh token (config file, then keyring)
//! 3. Wires the drive adapter into the sync pipeline and runs it
//! 4. Prints the run report

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::Args;
use tracing::info;

use cdsync_core::config::{Config, ConfigBuilder};
use cdsync_drive::auth::{KeyringTokenStorage, OAuthConfig, TokenClient};
use cdsync_drive::{CloudDriveStore, RefreshingCredentials};
use cdsync_sync::pipeline::{PipelineOptions, PipelineOutcome, PipelineResult, SyncPipeline};

use super::{expand_home, load_config};
use crate::output::{format_duration, get_formatter, plural, OutputFormat, OutputFormatter};
use crate::Context;

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Local directory to synchronize (overrides sync.path)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Regular expression selecting file names (overrides sync.file_pattern)
    #[arg(long)]
    pub pattern: Option<String>,

    /// Compute the plan without creating, uploading or deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Match remote files by name and folder only
    #[arg(long)]
    pub no_checksum: bool,

    /// Move remote files with no local counterpart to the trash
    #[arg(long)]
    pub delete: bool,
}

impl SyncCommand {
    /// Apply command-line overrides on top of the loaded configuration
    fn apply(&self, config: Config) -> Config {
        let mut builder = ConfigBuilder::from_config(config);
        if let Some(path) = &self.path {
            builder = builder.sync_path(path.clone());
        }
        if let Some(pattern) = &self.pattern {
            builder = builder.sync_file_pattern(pattern.clone());
        }
        if self.dry_run {
            builder = builder.sync_dry_run(true);
        }
        if self.no_checksum {
            builder = builder.sync_checksum(false);
        }
        if self.delete {
            builder = builder.sync_delete(true);
        }

        let mut config = builder.build();
        config.sync.path = expand_home(&config.sync.path);
        config
    }

    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let formatter = get_formatter(ctx.format, ctx.quiet);

        let config = self.apply(load_config(&ctx.config_path)?);
        info!(config_path = %ctx.config_path.display(), root = %config.sync.path.display(), "Loaded configuration");

        let errors = config.validate();
        if !errors.is_empty() {
            let list: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Invalid configuration: {}", list.join("; "));
        }

        let refresh_token = resolve_refresh_token(&config)?;
        let token_client = TokenClient::new(&OAuthConfig::from_config(&config))?;
        let credentials = Arc::new(RefreshingCredentials::new(token_client, refresh_token));
        let store = Arc::new(CloudDriveStore::from_config(&config.drive, credentials));

        let options = PipelineOptions::from_config(&config)?;
        if options.transfer.dry_run {
            formatter.info("Dry run: no changes will be made");
        }

        let result = SyncPipeline::new(store, options).run().await?;
        print_report(&*formatter, ctx.format, &result)
    }
}

/// The refresh token from the config file, or the one stored by `cdsync auth login`
fn resolve_refresh_token(config: &Config) -> Result<String> {
    if let Some(token) = config
        .auth
        .refresh_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
    {
        return Ok(token.to_string());
    }

    let stored = KeyringTokenStorage::load(&config.auth.client_id)
        .context("Failed to read the keyring")?
        .and_then(|tokens| tokens.refresh_token);
    match stored {
        Some(token) => Ok(token),
        None => bail!("No refresh token. Run 'cdsync auth login' or set auth.refresh_token"),
    }
}

fn print_report(
    formatter: &dyn OutputFormatter,
    format: OutputFormat,
    result: &PipelineResult,
) -> Result<()> {
    let report = &result.report;

    if format == OutputFormat::Json {
        let mut json = serde_json::to_value(report).context("Failed to serialize report")?;
        json["outcome"] = serde_json::to_value(result.outcome)?;
        formatter.print_json(&json);
        return Ok(());
    }

    let duration = format_duration(report.duration_ms);
    match result.outcome {
        PipelineOutcome::NothingToDo if report.files_matched == 0 => {
            formatter.success(&format!("Nothing to do, no matching files ({duration})"));
            return Ok(());
        }
        PipelineOutcome::NothingToDo => {
            formatter.success(&format!("Already up to date ({duration})"));
        }
        PipelineOutcome::Completed if report.dry_run => {
            formatter.success(&format!("Dry run completed in {duration}"));
        }
        PipelineOutcome::Completed => {
            formatter.success(&format!("Sync completed in {duration}"));
        }
    }

    formatter.field(
        "Local",
        &format!(
            "{} matched of {} scanned",
            plural(report.files_matched, "file"),
            report.files_scanned
        ),
    );
    formatter.field(
        "Remote",
        &format!(
            "{}, {}",
            plural(report.remote_folders, "folder"),
            plural(report.remote_files, "file")
        ),
    );
    formatter.field(
        "Folders",
        &format!(
            "{} matched, {} created, {} planned",
            report.folders_matched, report.folders_created, report.folders_planned
        ),
    );
    formatter.field("Kept", &plural(report.files_kept, "file"));
    formatter.field("Uploaded", &plural(report.files_uploaded, "file"));
    if report.delete_candidates > 0 {
        formatter.field(
            "Deleted",
            &format!("{} of {} candidates", report.files_deleted, report.delete_candidates),
        );
    }

    Ok(())
}
