//! Credential provider port
//!
//! The remote store adapter asks this port for a bearer token before every
//! request. Refresh scheduling is the provider's own business; callers only
//! observe that requests started after a refresh use the new token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth tokens issued by the authorization server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for obtaining new access tokens without user interaction
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// First characters of the access token, safe to log
    #[must_use]
    pub fn access_token_prefix(&self) -> &str {
        let end = self
            .access_token
            .char_indices()
            .nth(10)
            .map_or(self.access_token.len(), |(i, _)| i);
        &self.access_token[..end]
    }
}

/// Port trait for bearer credential providers
#[async_trait::async_trait]
pub trait ICredentialProvider: Send + Sync {
    /// Obtain the first token; resolves once the provider is ready
    async fn init(&self) -> anyhow::Result<()>;

    /// Current bearer token
    ///
    /// # Errors
    /// Fails if `init` has not completed successfully
    async fn bearer_token(&self) -> anyhow::Result<String>;

    /// Stop any background refresh
    async fn shutdown(&self);
}
