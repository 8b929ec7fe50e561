//! HTTP client for the cloud drive service
//!
//! Every request carries the bearer token current at the time it is built,
//! so requests started after a background refresh use the new token.
//! Metadata calls go to `metadataUrl`, uploads to `contentUrl`; both are
//! discovered once per session from the account endpoint.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use cdsync_core::ports::ICredentialProvider;

use crate::DriveError;

const USER_AGENT: &str = concat!("cdsync/", env!("CARGO_PKG_VERSION"));

/// Service endpoints of the account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base URL for node metadata, always ending in `/`
    pub metadata_url: String,
    /// Base URL for content uploads, always ending in `/`
    pub content_url: String,
}

impl Endpoints {
    pub fn new(metadata_url: impl Into<String>, content_url: impl Into<String>) -> Self {
        Self {
            metadata_url: with_trailing_slash(metadata_url.into()),
            content_url: with_trailing_slash(content_url.into()),
        }
    }
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Response of the endpoint discovery call
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointResponse {
    metadata_url: Option<String>,
    content_url: Option<String>,
    customer_exists: Option<bool>,
}

/// Authenticated client for the cloud drive API
pub struct DriveClient {
    http: Client,
    credentials: Arc<dyn ICredentialProvider>,
    discovery_url: String,
    endpoints: RwLock<Option<Endpoints>>,
}

impl DriveClient {
    /// Creates a client that discovers its endpoints from `discovery_url`
    pub fn new(credentials: Arc<dyn ICredentialProvider>, discovery_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            credentials,
            discovery_url: discovery_url.into(),
            endpoints: RwLock::new(None),
        }
    }

    /// The credential provider used to authenticate requests
    pub fn credentials(&self) -> &Arc<dyn ICredentialProvider> {
        &self.credentials
    }

    /// Fetches the account endpoints and caches them for later requests
    #[instrument(skip(self), fields(url = %self.discovery_url))]
    pub async fn discover(&self) -> Result<Endpoints> {
        let response = self
            .request(Method::GET, &self.discovery_url)
            .await?
            .send()
            .await
            .context("Failed to send endpoint discovery request")?;
        let response = expect_status(response, &[StatusCode::OK])
            .await
            .context("Endpoint discovery failed")?;

        let body: EndpointResponse = response
            .json()
            .await
            .context("Failed to parse endpoint discovery response")?;

        if body.customer_exists == Some(false) {
            warn!("Account reports no cloud drive customer record");
        }

        let metadata_url = body
            .metadata_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| DriveError::MissingEndpoint("metadataUrl".to_string()))?;
        let content_url = body
            .content_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| DriveError::MissingEndpoint("contentUrl".to_string()))?;

        let endpoints = Endpoints::new(metadata_url, content_url);
        info!(
            metadata_url = %endpoints.metadata_url,
            content_url = %endpoints.content_url,
            "Drive endpoints discovered"
        );

        *self.endpoints.write().await = Some(endpoints.clone());
        Ok(endpoints)
    }

    /// The cached endpoints
    ///
    /// # Errors
    /// [`DriveError::MissingEndpoint`] if [`discover`](Self::discover) has not succeeded
    pub async fn endpoints(&self) -> Result<Endpoints, DriveError> {
        self.endpoints
            .read()
            .await
            .clone()
            .ok_or_else(|| DriveError::MissingEndpoint("endpoints not discovered".to_string()))
    }

    /// Absolute URL of a metadata resource
    pub async fn metadata_url(&self, path: &str) -> Result<String, DriveError> {
        Ok(format!("{}{}", self.endpoints().await?.metadata_url, path))
    }

    /// Absolute URL of a content resource
    pub async fn content_url(&self, path: &str) -> Result<String, DriveError> {
        Ok(format!("{}{}", self.endpoints().await?.content_url, path))
    }

    /// Builds a request carrying the current bearer token
    pub async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self
            .credentials
            .bearer_token()
            .await
            .context("No bearer token available")?;
        debug!(%method, url, "Building request");
        Ok(self.http.request(method, url).bearer_auth(token))
    }
}

/// Passes the response through if its status is one of `expected`
///
/// Otherwise the body is read and the status mapped to a [`DriveError`].
pub(crate) async fn expect_status(
    response: Response,
    expected: &[StatusCode],
) -> Result<Response, DriveError> {
    let status = response.status();
    if expected.contains(&status) {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => DriveError::Unauthorized(body),
        StatusCode::NOT_FOUND => DriveError::NotFound(body),
        StatusCode::CONFLICT => DriveError::Conflict(body),
        other => DriveError::UnexpectedStatus {
            status: other.as_u16(),
            body,
        },
    })
}
