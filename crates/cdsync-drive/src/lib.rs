//! cdsync Drive - cloud drive REST adapter
//!
//! Provides:
//! - Endpoint discovery and an authenticated HTTP client
//! - The [`IRemoteStore`](cdsync_core::ports::IRemoteStore) implementation
//!   (paginated listing, folder creation, multipart upload, trash)
//! - OAuth2 refresh-token credentials with background refresh
//! - Interactive login with a local callback server and keyring storage
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 token client, keyring storage, interactive login
//! - [`client`] - HTTP client bound to the discovered endpoints
//! - [`credentials`] - Refreshing bearer credential provider
//! - [`nodes`] - Node JSON parsing
//! - [`store`] - Remote store adapter

pub mod auth;
pub mod client;
pub mod credentials;
pub mod nodes;
pub mod store;

use thiserror::Error;

pub use client::{DriveClient, Endpoints};
pub use credentials::RefreshingCredentials;
pub use store::CloudDriveStore;

/// Errors returned by the cloud drive service
#[derive(Debug, Error)]
pub enum DriveError {
    /// The access token was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested node does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A node with the same name already exists under the parent
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other non-success status
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, as returned by the service
        body: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Endpoint discovery has not run or did not return the endpoint
    #[error("Endpoint not available: {0}")]
    MissingEndpoint(String),

    /// The response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
