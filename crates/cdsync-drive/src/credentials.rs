//! Refresh-token credential provider
//!
//! `init` performs the first refresh. A background task then refreshes
//! again [`DEFAULT_REFRESH_LEAD`] before each expiry and replaces the shared
//! token cell; readers always get the latest value. `shutdown` aborts the
//! task.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cdsync_core::ports::{ICredentialProvider, Tokens};

use crate::auth::TokenClient;

/// How long before expiry the token is refreshed
pub const DEFAULT_REFRESH_LEAD: Duration = Duration::from_secs(600);

/// Lower bound between two refreshes, also the retry delay after a failure
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Bearer credentials kept fresh with the refresh-token grant
pub struct RefreshingCredentials {
    client: Arc<TokenClient>,
    refresh_token: String,
    tokens: Arc<RwLock<Option<Tokens>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    refresh_lead: Duration,
    min_interval: Duration,
}

impl RefreshingCredentials {
    pub fn new(client: TokenClient, refresh_token: impl Into<String>) -> Self {
        Self {
            client: Arc::new(client),
            refresh_token: refresh_token.into(),
            tokens: Arc::new(RwLock::new(None)),
            task: Mutex::new(None),
            refresh_lead: DEFAULT_REFRESH_LEAD,
            min_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Overrides the refresh lead and the minimum refresh interval
    pub fn with_schedule(mut self, refresh_lead: Duration, min_interval: Duration) -> Self {
        self.refresh_lead = refresh_lead;
        self.min_interval = min_interval;
        self
    }

    /// The current tokens, if `init` has succeeded
    pub async fn tokens(&self) -> Option<Tokens> {
        self.tokens.read().await.clone()
    }

    /// Whether the background refresh task is running
    pub async fn is_refreshing(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Delay until the next refresh of `tokens`
fn refresh_delay(tokens: &Tokens, lead: Duration, min_interval: Duration) -> Duration {
    let remaining = (tokens.expires_at - Utc::now())
        .to_std()
        .unwrap_or(Duration::ZERO);
    remaining.saturating_sub(lead).max(min_interval)
}

async fn refresh_loop(
    client: Arc<TokenClient>,
    cell: Arc<RwLock<Option<Tokens>>>,
    mut refresh_token: String,
    lead: Duration,
    min_interval: Duration,
) {
    loop {
        let delay = match cell.read().await.as_ref() {
            Some(tokens) => refresh_delay(tokens, lead, min_interval),
            None => min_interval,
        };
        debug!(delay_secs = delay.as_secs(), "Next token refresh scheduled");
        tokio::time::sleep(delay).await;

        match client.refresh(&refresh_token).await {
            Ok(tokens) => {
                if let Some(rotated) = tokens.refresh_token.clone() {
                    refresh_token = rotated;
                }
                *cell.write().await = Some(tokens);
            }
            Err(e) => {
                // The current token stays in place until it expires.
                warn!(error = %format!("{e:#}"), "Background token refresh failed");
                let stale = cell.read().await.as_ref().map_or(true, Tokens::is_expired);
                if stale {
                    *cell.write().await = None;
                }
                tokio::time::sleep(min_interval).await;
            }
        }
    }
}

#[async_trait::async_trait]
impl ICredentialProvider for RefreshingCredentials {
    async fn init(&self) -> Result<()> {
        let tokens = self.client.refresh(&self.refresh_token).await?;
        let refresh_token = tokens
            .refresh_token
            .clone()
            .unwrap_or_else(|| self.refresh_token.clone());
        *self.tokens.write().await = Some(tokens);

        let mut task = self.task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
        }
        *task = Some(tokio::spawn(refresh_loop(
            Arc::clone(&self.client),
            Arc::clone(&self.tokens),
            refresh_token,
            self.refresh_lead,
            self.min_interval,
        )));

        info!("Credentials ready");
        Ok(())
    }

    async fn bearer_token(&self) -> Result<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| anyhow!("No access token: credentials are not initialized or expired"))
    }

    async fn shutdown(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
            debug!("Token refresh task stopped");
        }
    }
}
