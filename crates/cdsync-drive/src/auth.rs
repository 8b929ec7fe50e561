//! OAuth2 for the cloud drive
//!
//! ## Components
//!
//! - [`OAuthConfig`] - Client credentials and endpoints
//! - [`TokenClient`] - Authorization-code exchange and refresh-token grant
//! - [`KeyringTokenStorage`] - Refresh token storage in the system keyring
//! - [`LocalCallbackServer`] - One-shot HTTP server receiving the redirect
//! - [`InteractiveLogin`] - Browser login orchestrating the above
//!
//! The service expects the client id and secret in the request body rather
//! than in a basic-auth header.

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use http_body_util::Full;
use hyper::body::Bytes;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use tracing::{debug, info, warn};

use cdsync_core::config::Config;
use cdsync_core::ports::Tokens;

/// Keyring service name for stored tokens
const KEYRING_SERVICE: &str = "cdsync";

/// Scopes needed to list and write the drive
const DEFAULT_SCOPES: &[&str] = &["clouddrive:read_all", "clouddrive:write"];

// ============================================================================
// OAuthConfig
// ============================================================================

/// OAuth2 client settings
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Redirect URI served by [`LocalCallbackServer`]
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.auth.client_id.clone(),
            client_secret: config.auth.client_secret.clone(),
            authorize_url: config.drive.authorize_url.clone(),
            token_url: config.drive.token_url.clone(),
            redirect_uri: config.drive.redirect_uri.clone(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// TokenClient
// ============================================================================

type DriveOAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Token endpoint client built on the `oauth2` crate
pub struct TokenClient {
    client: DriveOAuthClient,
    http: reqwest::Client,
    scopes: Vec<String>,
}

impl TokenClient {
    pub fn new(config: &OAuthConfig) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(
                AuthUrl::new(config.authorize_url.clone()).context("Invalid authorization URL")?,
            )
            .set_token_uri(TokenUrl::new(config.token_url.clone()).context("Invalid token URL")?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone()).context("Invalid redirect URI")?,
            );

        // The token endpoint must not be followed through redirects.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build token HTTP client")?;

        Ok(Self {
            client,
            http,
            scopes: config.scopes.clone(),
        })
    }

    /// Authorization URL the user opens in a browser, with its CSRF state
    pub fn authorize_url(&self) -> (String, CsrfToken) {
        let mut request = self.client.authorize_url(CsrfToken::new_random);
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (url, csrf) = request.url();
        debug!("Generated authorization URL");
        (url.to_string(), csrf)
    }

    /// Exchanges an authorization code for tokens
    pub async fn exchange_code(&self, code: String) -> Result<Tokens> {
        info!("Exchanging authorization code for tokens");
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(&self.http)
            .await
            .context("Failed to exchange authorization code")?;

        Ok(tokens_from_response(&response, None))
    }

    /// Obtains a fresh access token with the refresh-token grant
    ///
    /// The returned tokens keep `refresh_token` if the server does not
    /// rotate it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        debug!("Refreshing access token");
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .context("Failed to refresh access token")?;

        let tokens = tokens_from_response(&response, Some(refresh_token));
        info!(
            access_token = %tokens.access_token_prefix(),
            expires_at = %tokens.expires_at,
            "Access token refreshed"
        );
        Ok(tokens)
    }
}

fn tokens_from_response(response: &BasicTokenResponse, previous_refresh: Option<&str>) -> Tokens {
    let expires_at = response
        .expires_in()
        .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
        .unwrap_or_else(|| Utc::now() + Duration::hours(1));

    Tokens {
        access_token: response.access_token().secret().to_string(),
        refresh_token: response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .or_else(|| previous_refresh.map(str::to_string)),
        expires_at,
    }
}

// ============================================================================
// KeyringTokenStorage
// ============================================================================

/// Stores tokens in the system keyring
///
/// Entries live under the service name `cdsync`, keyed by OAuth client id,
/// serialized as JSON.
pub struct KeyringTokenStorage;

impl KeyringTokenStorage {
    pub fn store(client_id: &str, tokens: &Tokens) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, client_id)
            .context("Failed to create keyring entry")?;
        let json = serde_json::to_string(tokens).context("Failed to serialize tokens")?;
        entry
            .set_password(&json)
            .context("Failed to store tokens in keyring")?;

        debug!(client_id, "Stored tokens in keyring");
        Ok(())
    }

    /// Returns `None` when nothing is stored for `client_id`
    pub fn load(client_id: &str) -> Result<Option<Tokens>> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, client_id)
            .context("Failed to create keyring entry")?;

        match entry.get_password() {
            Ok(json) => {
                let tokens: Tokens = serde_json::from_str(&json)
                    .context("Failed to deserialize tokens from keyring")?;
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(client_id, "No tokens in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    pub fn clear(client_id: &str) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, client_id)
            .context("Failed to create keyring entry")?;

        match entry.delete_credential() {
            Ok(()) => {
                info!(client_id, "Cleared tokens from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// Parameters of the OAuth redirect
#[derive(Debug, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// What the redirect carried
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Authorized(CallbackParams),
    Denied { error: String, description: String },
    Invalid,
}

/// One-shot HTTP server on the host and port of the redirect URI
///
/// Requests to other paths (a browser asking for `/favicon.ico`) get a 404
/// and the server keeps waiting.
pub struct LocalCallbackServer {
    redirect_uri: url::Url,
}

impl LocalCallbackServer {
    pub fn new(redirect_uri: &str) -> Result<Self> {
        let redirect_uri = url::Url::parse(redirect_uri).context("Invalid redirect URI")?;
        if redirect_uri.host_str().is_none() {
            bail!("Redirect URI has no host: {redirect_uri}");
        }
        Ok(Self { redirect_uri })
    }

    /// Waits for the redirect and returns its parameters
    pub async fn wait_for_callback(&self) -> Result<CallbackParams> {
        use std::convert::Infallible;
        use std::sync::Arc;

        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{Request, StatusCode};
        use hyper_util::rt::TokioIo;
        use tokio::net::TcpListener;
        use tokio::sync::{mpsc, Mutex};

        let host = self.redirect_uri.host_str().unwrap_or("127.0.0.1");
        let port = self.redirect_uri.port_or_known_default().unwrap_or(80);
        let expected_path = self.redirect_uri.path().to_string();

        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind callback server to {host}:{port}"))?;
        info!(host, port, path = %expected_path, "Waiting for OAuth callback");

        let (tx, mut rx) = mpsc::channel::<Callback>(1);
        let tx = Arc::new(Mutex::new(Some(tx)));

        loop {
            let (stream, _addr) = tokio::select! {
                accepted = listener.accept() => {
                    accepted.context("Failed to accept connection on callback server")?
                }
                Some(callback) = rx.recv() => {
                    return Self::into_params(callback);
                }
            };

            let tx = tx.clone();
            let expected_path = expected_path.clone();
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let tx = tx.clone();
                let expected_path = expected_path.clone();
                async move {
                    if req.uri().path() != expected_path {
                        return Ok::<_, Infallible>(html_response(
                            StatusCode::NOT_FOUND,
                            error_html("Not found"),
                        ));
                    }

                    let callback = parse_callback(&req.uri().to_string());
                    let response = match &callback {
                        Callback::Authorized(_) => html_response(StatusCode::OK, success_html()),
                        Callback::Denied { description, .. } => {
                            html_response(StatusCode::BAD_REQUEST, error_html(description))
                        }
                        Callback::Invalid => html_response(
                            StatusCode::BAD_REQUEST,
                            error_html("Missing authorization code in callback"),
                        ),
                    };

                    if let Some(sender) = tx.lock().await.take() {
                        let _ = sender.send(callback).await;
                    }
                    Ok(response)
                }
            });

            let io = TokioIo::new(stream);
            tokio::spawn(async move {
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!("Callback server connection error: {}", e);
                }
            });

        }
    }

    fn into_params(callback: Callback) -> Result<CallbackParams> {
        match callback {
            Callback::Authorized(params) => {
                info!("Received OAuth callback with authorization code");
                Ok(params)
            }
            Callback::Denied { error, description } => {
                bail!("Authorization denied: {error}: {description}")
            }
            Callback::Invalid => bail!("OAuth callback carried no authorization code"),
        }
    }
}

fn html_response(
    status: hyper::StatusCode,
    html: String,
) -> hyper::Response<Full<Bytes>> {
    let mut response = hyper::Response::new(Full::new(Bytes::from(html)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

/// Parses the authorization code, state or error from a callback URI
fn parse_callback(uri: &str) -> Callback {
    let Ok(url) = url::Url::parse(&format!("http://localhost{uri}")) else {
        return Callback::Invalid;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            "error" => error = Some(value.to_string()),
            "error_description" => description = Some(value.to_string()),
            _ => {}
        }
    }

    match (code, error) {
        (_, Some(error)) => Callback::Denied {
            description: description.unwrap_or_else(|| error.clone()),
            error,
        },
        (Some(code), None) => Callback::Authorized(CallbackParams {
            code,
            state: state.unwrap_or_default(),
        }),
        (None, None) => Callback::Invalid,
    }
}

fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>cdsync - Authentication Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Successful</h1>
    <p>You can close this window and return to cdsync.</p>
</body>
</html>"#
        .to_string()
}

fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>cdsync - Authentication Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Error</h1>
    <p>{message}</p>
    <p>Please close this window and try again.</p>
</body>
</html>"#
    )
}

// ============================================================================
// InteractiveLogin
// ============================================================================

/// Browser-based authorization-code login
///
/// 1. Builds the authorization URL
/// 2. Opens it in the default browser (and logs it for manual use)
/// 3. Waits for the redirect on the local callback server
/// 4. Checks the CSRF state and exchanges the code for tokens
pub struct InteractiveLogin {
    config: OAuthConfig,
}

impl InteractiveLogin {
    pub fn new(config: OAuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub async fn login(&self) -> Result<Tokens> {
        let client = TokenClient::new(&self.config)?;
        let server = LocalCallbackServer::new(&self.config.redirect_uri)?;

        let (auth_url, csrf) = client.authorize_url();
        info!(url = %auth_url, "Open this URL to authorize cdsync");
        if let Err(e) = webbrowser::open(&auth_url) {
            warn!("Failed to open browser: {}", e);
        }

        let callback = server.wait_for_callback().await?;
        if callback.state != *csrf.secret() {
            bail!("OAuth state mismatch, the callback did not originate from this login");
        }

        let tokens = client.exchange_code(callback.code).await?;
        if tokens.refresh_token.is_none() {
            warn!("Authorization server returned no refresh token");
        }
        Ok(tokens)
    }
}
