//! Auth commands - log in to and out of the cloud drive
//!
//! - `login` runs the browser authorization-code flow, stores the tokens in
//!   the system keyring and prints the refresh token for the config file.
//! - `logout` removes the stored tokens.

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use tracing::info;

use cdsync_core::config::Config;
use cdsync_drive::auth::{InteractiveLogin, KeyringTokenStorage, OAuthConfig};

use super::load_config;
use crate::output::{get_formatter, OutputFormat};
use crate::Context;

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authorize cdsync in the browser and store the refresh token
    Login,
    /// Remove stored credentials
    Logout,
}

fn require_client(config: &Config) -> Result<()> {
    if config.auth.client_id.trim().is_empty() || config.auth.client_secret.trim().is_empty() {
        bail!("auth.client_id and auth.client_secret must be set in the configuration");
    }
    Ok(())
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let config = load_config(&ctx.config_path)?;
        require_client(&config)?;

        match self {
            AuthCommand::Login => Self::login(&config, ctx).await,
            AuthCommand::Logout => Self::logout(&config, ctx),
        }
    }

    async fn login(config: &Config, ctx: &Context) -> Result<()> {
        let fmt = get_formatter(ctx.format, ctx.quiet);
        info!(client_id = %config.auth.client_id, "Starting OAuth2 login");

        fmt.info("Opening browser for login...");
        let tokens = InteractiveLogin::new(OAuthConfig::from_config(config))
            .login()
            .await
            .context("OAuth2 login failed")?;

        KeyringTokenStorage::store(&config.auth.client_id, &tokens)
            .context("Failed to store tokens in keyring")?;

        let refresh_token = tokens.refresh_token.unwrap_or_default();
        if ctx.format == OutputFormat::Json {
            fmt.print_json(&serde_json::json!({
                "success": true,
                "refresh_token": refresh_token,
                "expires_at": tokens.expires_at.to_rfc3339(),
            }));
        } else {
            fmt.success("Authenticated, tokens stored in the system keyring");
            if !refresh_token.is_empty() {
                fmt.info("To use this login without the keyring, add to the config file:");
                fmt.info("auth:");
                fmt.info(&format!("  refresh_token: {refresh_token}"));
            }
        }
        Ok(())
    }

    fn logout(config: &Config, ctx: &Context) -> Result<()> {
        let fmt = get_formatter(ctx.format, ctx.quiet);
        KeyringTokenStorage::clear(&config.auth.client_id)?;
        fmt.success("Stored credentials removed");
        if config.auth.refresh_token.is_some() {
            fmt.warn("auth.refresh_token is still set in the configuration file");
        }
        Ok(())
    }
}
