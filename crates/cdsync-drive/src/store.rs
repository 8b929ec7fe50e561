//! Remote store backed by the cloud drive REST API
//!
//! - Listing: `GET {metadataUrl}nodes?filters=..&limit=..[&startToken=..]`
//! - Folder creation: `POST {metadataUrl}nodes` (expects 201)
//! - Upload: multipart `POST {contentUrl}nodes` with `metadata` and `content`
//!   parts, the content streamed from disk (expects 201)
//! - Delete: `PUT {metadataUrl}trash/{id}` moves the node to the trash

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method, StatusCode};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument};

use cdsync_core::config::DriveConfig;
use cdsync_core::domain::{RemoteId, RemoteKind, RemoteNode};
use cdsync_core::ports::{
    ICredentialProvider, IRemoteStore, ListQuery, NewFile, NewFolder, NodePage,
};

use crate::client::{expect_status, DriveClient};
use crate::nodes::{listing_filter, ApiNode, NodeList, NodeMetadata, NodeParser};

/// [`IRemoteStore`] adapter for the cloud drive
pub struct CloudDriveStore {
    client: DriveClient,
    page_size: u32,
    label: String,
}

impl CloudDriveStore {
    /// Creates a store on top of `client`
    ///
    /// # Arguments
    /// * `page_size` - Nodes requested per listing page
    /// * `label` - Label attached to created nodes; empty for none
    pub fn new(client: DriveClient, page_size: u32, label: impl Into<String>) -> Self {
        Self {
            client,
            page_size,
            label: label.into(),
        }
    }

    pub fn from_config(config: &DriveConfig, credentials: Arc<dyn ICredentialProvider>) -> Self {
        let client = DriveClient::new(credentials, config.discovery_url.clone());
        Self::new(client, config.page_size, config.folder_label.clone())
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }

    fn metadata<'a>(&'a self, name: &'a str, kind: RemoteKind, parents: &'a [RemoteId]) -> NodeMetadata<'a> {
        NodeMetadata {
            name,
            kind,
            labels: if self.label.is_empty() {
                Vec::new()
            } else {
                vec![self.label.as_str()]
            },
            parents: parents.iter().map(RemoteId::as_str).collect(),
        }
    }

    async fn parse_created(response: reqwest::Response) -> Result<RemoteNode> {
        let node: ApiNode = response
            .json()
            .await
            .context("Failed to parse created node")?;
        Ok(NodeParser::parse_node(node)?)
    }
}

#[async_trait::async_trait]
impl IRemoteStore for CloudDriveStore {
    async fn open(&self) -> Result<()> {
        self.client
            .credentials()
            .init()
            .await
            .context("Failed to obtain an access token")?;
        self.client.discover().await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.credentials().shutdown().await;
        debug!("Drive session closed");
        Ok(())
    }

    #[instrument(skip(self), fields(kind = %query.kind))]
    async fn list_page(&self, query: &ListQuery, start_token: Option<&str>) -> Result<NodePage> {
        let url = self.client.metadata_url("nodes").await?;

        let mut params = vec![
            ("filters", listing_filter(query)),
            ("limit", self.page_size.to_string()),
        ];
        if let Some(token) = start_token {
            params.push(("startToken", token.to_string()));
        }

        let response = self
            .client
            .request(Method::GET, &url)
            .await?
            .query(&params)
            .send()
            .await
            .context("Failed to send listing request")?;
        let response = expect_status(response, &[StatusCode::OK])
            .await
            .context("Listing request failed")?;

        let list: NodeList = response
            .json()
            .await
            .context("Failed to parse listing response")?;
        let page = NodeParser::parse_page(list)?;

        debug!(
            nodes = page.nodes.len(),
            count = ?page.count,
            more = page.next_token.is_some(),
            "Listing page fetched"
        );
        Ok(page)
    }

    #[instrument(skip(self, folder), fields(name = %folder.name))]
    async fn create_folder(&self, folder: &NewFolder) -> Result<RemoteNode> {
        let url = self.client.metadata_url("nodes").await?;
        let body = self.metadata(&folder.name, RemoteKind::Folder, &folder.parents);

        let response = self
            .client
            .request(Method::POST, &url)
            .await?
            .json(&body)
            .send()
            .await
            .context("Failed to send folder creation request")?;
        let response = expect_status(response, &[StatusCode::CREATED])
            .await
            .with_context(|| format!("Failed to create folder {}", folder.name))?;

        let node = Self::parse_created(response).await?;
        info!(name = %node.name, id = %node.id, "Folder created");
        Ok(node)
    }

    #[instrument(skip(self, file), fields(name = %file.name))]
    async fn upload_file(&self, file: &NewFile) -> Result<RemoteNode> {
        let url = self.client.content_url("nodes").await?;

        let handle = tokio::fs::File::open(&file.path)
            .await
            .with_context(|| format!("Failed to open {}", file.path.display()))?;
        let length = handle
            .metadata()
            .await
            .with_context(|| format!("Failed to stat {}", file.path.display()))?
            .len();

        let metadata = serde_json::to_string(&self.metadata(&file.name, RemoteKind::File, &file.parents))
            .context("Failed to serialize upload metadata")?;
        let content = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(handle)), length)
            .file_name(file.name.clone())
            .mime_str("application/octet-stream")
            .context("Invalid content type")?;
        let form = Form::new().text("metadata", metadata).part("content", content);

        let response = self
            .client
            .request(Method::POST, &url)
            .await?
            .multipart(form)
            .send()
            .await
            .context("Failed to send upload request")?;
        let response = expect_status(response, &[StatusCode::CREATED])
            .await
            .with_context(|| format!("Failed to upload {}", file.path.display()))?;

        let node = Self::parse_created(response).await?;
        debug!(id = %node.id, bytes = length, "File uploaded");
        Ok(node)
    }

    #[instrument(skip(self))]
    async fn delete_node(&self, id: &RemoteId) -> Result<()> {
        let url = self.client.metadata_url(&format!("trash/{id}")).await?;

        let response = self
            .client
            .request(Method::PUT, &url)
            .await?
            .send()
            .await
            .context("Failed to send trash request")?;
        expect_status(
            response,
            &[StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT],
        )
        .await
        .with_context(|| format!("Failed to move node {id} to trash"))?;

        debug!("Node moved to trash");
        Ok(())
    }
}
