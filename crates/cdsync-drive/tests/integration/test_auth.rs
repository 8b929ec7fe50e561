//! Integration tests for the refresh-token credential provider and
//! endpoint discovery

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{bearer_token, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cdsync_core::ports::{ICredentialProvider, IRemoteStore};
use cdsync_drive::auth::{OAuthConfig, TokenClient};
use cdsync_drive::{CloudDriveStore, DriveClient, DriveError, RefreshingCredentials};

use crate::common;

const REFRESH_TOKEN: &str = "Atzr|initial-refresh-token";

fn oauth_config(server: &MockServer) -> OAuthConfig {
    OAuthConfig {
        client_id: "amzn1.application-oa2-client.test".to_string(),
        client_secret: "test-secret".to_string(),
        authorize_url: format!("{}/ap/oa", server.uri()),
        token_url: format!("{}/auth/o2/token", server.uri()),
        redirect_uri: "http://127.0.0.1:8500/login/cb".to_string(),
        scopes: vec!["clouddrive:read_all".to_string()],
    }
}

fn token_body(access_token: &str, expires_in: u64) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "refresh_token": REFRESH_TOKEN,
        "token_type": "bearer",
        "expires_in": expires_in
    })
}

fn credentials(server: &MockServer) -> RefreshingCredentials {
    let client = TokenClient::new(&oauth_config(server)).expect("Invalid OAuth config");
    RefreshingCredentials::new(client, REFRESH_TOKEN)
}

#[tokio::test]
async fn test_init_refreshes_with_client_credentials_in_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/o2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("client_id=amzn1.application-oa2-client.test"))
        .and(body_string_contains("client_secret=test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("Atza|first", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = credentials(&server);
    assert!(credentials.bearer_token().await.is_err());

    credentials.init().await.expect("Init failed");
    assert_eq!(credentials.bearer_token().await.unwrap(), "Atza|first");
    assert!(credentials.is_refreshing().await);

    let tokens = credentials.tokens().await.unwrap();
    assert_eq!(tokens.refresh_token.as_deref(), Some(REFRESH_TOKEN));
    assert!(!tokens.is_expired());

    credentials.shutdown().await;
    assert!(!credentials.is_refreshing().await);
}

#[tokio::test]
async fn test_background_refresh_replaces_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/o2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("Atza|first", 1)))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/o2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("Atza|second", 3600)))
        .mount(&server)
        .await;

    let credentials = credentials(&server)
        .with_schedule(Duration::from_secs(600), Duration::from_millis(50));
    credentials.init().await.expect("Init failed");

    let mut token = credentials.bearer_token().await.unwrap();
    for _ in 0..40 {
        if token == "Atza|second" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        token = credentials.bearer_token().await.unwrap();
    }
    assert_eq!(token, "Atza|second");

    credentials.shutdown().await;
}

#[tokio::test]
async fn test_rejected_refresh_token_fails_init() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/o2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "The request has an invalid grant parameter"
        })))
        .mount(&server)
        .await;

    let credentials = credentials(&server);
    let err = credentials.init().await.unwrap_err();

    assert!(err.to_string().contains("Failed to refresh access token"));
    assert!(credentials.bearer_token().await.is_err());
    assert!(!credentials.is_refreshing().await);
}

#[tokio::test]
async fn test_open_uses_refreshed_token_for_discovery() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/o2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("Atza|first", 3600)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drive/v1/account/endpoint"))
        .and(bearer_token("Atza|first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "metadataUrl": format!("{}/drive/v1/", server.uri()),
            "contentUrl": format!("{}/cdproxy/", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Arc::new(credentials(&server));
    let client = DriveClient::new(credentials.clone(), common::discovery_url(&server));
    let store = CloudDriveStore::new(client, 200, common::LABEL);

    store.open().await.expect("Open failed");
    let endpoints = store.client().endpoints().await.unwrap();
    assert_eq!(endpoints.metadata_url, format!("{}/drive/v1/", server.uri()));
    assert!(credentials.is_refreshing().await);

    store.close().await.unwrap();
    assert!(!credentials.is_refreshing().await);
}

#[tokio::test]
async fn test_discovery_without_content_url() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v1/account/endpoint"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "customerExists": true,
            "metadataUrl": format!("{}/drive/v1/", server.uri())
        })))
        .mount(&server)
        .await;

    let client = DriveClient::new(Arc::new(common::StaticCredentials), common::discovery_url(&server));
    let err = client.discover().await.unwrap_err();

    match err.downcast_ref::<DriveError>() {
        Some(DriveError::MissingEndpoint(name)) => assert_eq!(name, "contentUrl"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_discovery_failure_fails_open() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v1/account/endpoint"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = DriveClient::new(Arc::new(common::StaticCredentials), common::discovery_url(&server));
    let store = CloudDriveStore::new(client, 200, common::LABEL);

    let err = store.open().await.unwrap_err();
    assert!(err.to_string().contains("Endpoint discovery failed"));
}
