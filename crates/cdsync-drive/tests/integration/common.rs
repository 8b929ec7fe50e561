//! Shared test helpers for cloud drive integration tests
//!
//! Each helper mounts the endpoints it needs on a wiremock server. The
//! metadata endpoint lives under `/drive/v1/` and the content endpoint under
//! `/cdproxy/` of the same server.

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cdsync_core::ports::{ICredentialProvider, IRemoteStore};
use cdsync_drive::{CloudDriveStore, DriveClient};

pub const ACCESS_TOKEN: &str = "Atza|test-access-token";
pub const LABEL: &str = "image-sync";

/// Credential provider returning a fixed token
pub struct StaticCredentials;

#[async_trait::async_trait]
impl ICredentialProvider for StaticCredentials {
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn bearer_token(&self) -> anyhow::Result<String> {
        Ok(ACCESS_TOKEN.to_string())
    }

    async fn shutdown(&self) {}
}

pub fn discovery_url(server: &MockServer) -> String {
    format!("{}/drive/v1/account/endpoint", server.uri())
}

/// Mounts `GET /drive/v1/account/endpoint`
pub async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/drive/v1/account/endpoint"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "customerExists": true,
            "metadataUrl": format!("{}/drive/v1/", server.uri()),
            "contentUrl": format!("{}/cdproxy", server.uri())
        })))
        .mount(server)
        .await;
}

/// A store against `server` that has not been opened yet
pub fn store_for(server: &MockServer) -> CloudDriveStore {
    let client = DriveClient::new(Arc::new(StaticCredentials), discovery_url(server));
    CloudDriveStore::new(client, 2, LABEL)
}

/// Starts a mock server with discovery mounted and returns an opened store
pub async fn setup_drive_mock() -> (MockServer, CloudDriveStore) {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    let store = store_for(&server);
    store.open().await.expect("Failed to open store");

    (server, store)
}

pub fn folder_json(id: &str, name: &str, parent: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "kind": "FOLDER",
        "parents": [parent],
        "isRoot": false,
        "labels": [LABEL]
    })
}

pub fn root_json(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "kind": "FOLDER",
        "parents": [],
        "isRoot": true
    })
}

pub fn file_json(id: &str, name: &str, parent: &str, md5: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "kind": "FILE",
        "parents": [parent],
        "labels": [LABEL],
        "contentProperties": {
            "md5": md5,
            "size": 3,
            "contentType": "image/jpeg"
        }
    })
}
