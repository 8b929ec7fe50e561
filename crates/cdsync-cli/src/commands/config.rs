//! Config command - view and validate the configuration
//!
//! - `show` prints the effective configuration (YAML or JSON) with secrets
//!   masked.
//! - `validate` loads the file and reports every validation error.

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use tracing::info;

use cdsync_core::config::Config;

use super::{expand_home, load_config};
use crate::output::{get_formatter, OutputFormat};
use crate::Context;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
}

const MASK: &str = "********";

/// Copy of `config` safe to print
fn masked(config: &Config) -> Config {
    let mut config = config.clone();
    if !config.auth.client_secret.is_empty() {
        config.auth.client_secret = MASK.to_string();
    }
    if config.auth.refresh_token.is_some() {
        config.auth.refresh_token = Some(MASK.to_string());
    }
    config
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
        }
    }

    fn execute_show(&self, ctx: &Context) -> Result<()> {
        let formatter = get_formatter(ctx.format, ctx.quiet);
        let config = masked(&load_config(&ctx.config_path)?);
        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.format == OutputFormat::Json {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");
            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
        Ok(())
    }

    fn execute_validate(&self, ctx: &Context) -> Result<()> {
        let formatter = get_formatter(ctx.format, ctx.quiet);
        if !ctx.config_path.exists() {
            bail!("Configuration file not found at {}", ctx.config_path.display());
        }

        let mut config = load_config(&ctx.config_path)?;
        config.sync.path = expand_home(&config.sync.path);
        let errors = config.validate();

        if ctx.format == OutputFormat::Json {
            let error_strings: Vec<String> = errors.iter().map(ToString::to_string).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": ctx.config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", ctx.config_path.display()));
        } else {
            formatter.info(&format!("File: {}", ctx.config_path.display()));
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        if !errors.is_empty() {
            bail!(
                "Configuration has {} error{}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            );
        }
        Ok(())
    }
}
