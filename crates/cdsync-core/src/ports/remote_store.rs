//! Remote store port (driven/secondary port)
//!
//! This module defines the interface the sync engine uses to talk to the
//! remote hierarchical object store. The production adapter targets the
//! cloud drive REST API; tests use an in-memory double.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because backend failures are adapter-specific.
//! - Pagination is exposed page by page: the caller threads the continuation
//!   token from one response into the next request.

use std::path::PathBuf;

use crate::domain::newtypes::RemoteId;
use crate::domain::remote_tree::{RemoteKind, RemoteNode};

/// Listing query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Kind of node the listing should return
    pub kind: RemoteKind,
    /// Backend-specific filter expression; `None` selects every node of `kind`
    pub filter: Option<String>,
}

impl ListQuery {
    /// All folders
    #[must_use]
    pub fn folders() -> Self {
        Self {
            kind: RemoteKind::Folder,
            filter: None,
        }
    }

    /// Files, optionally narrowed by a backend filter expression
    #[must_use]
    pub fn files(filter: Option<String>) -> Self {
        Self {
            kind: RemoteKind::File,
            filter,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct NodePage {
    /// Nodes on this page
    pub nodes: Vec<RemoteNode>,
    /// Continuation token for the next page (`None` on the last page)
    pub next_token: Option<String>,
    /// Total number of nodes the backend reports for the query, if known
    pub count: Option<u64>,
}

/// Request to create a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFolder {
    /// Folder name
    pub name: String,
    /// Parent folder ids
    pub parents: Vec<RemoteId>,
}

/// Request to upload a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    /// Remote file name
    pub name: String,
    /// Local file whose content is streamed
    pub path: PathBuf,
    /// Parent folder ids
    pub parents: Vec<RemoteId>,
}

/// Port trait for remote store operations
///
/// ## Implementation Notes
///
/// - Every method assumes a valid bearer credential; obtaining and refreshing
///   it is the adapter's concern.
/// - `open` is called once before the first listing and `close` once at the
///   end of the run, whether it succeeded or not.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Prepare the session (credentials, endpoint discovery)
    async fn open(&self) -> anyhow::Result<()>;

    /// Release the session (stop background credential refresh)
    async fn close(&self) -> anyhow::Result<()>;

    /// Fetch one page of a listing
    ///
    /// # Arguments
    /// * `query` - What to list
    /// * `start_token` - Token returned by the previous page, `None` for the first
    async fn list_page(
        &self,
        query: &ListQuery,
        start_token: Option<&str>,
    ) -> anyhow::Result<NodePage>;

    /// Create a folder and return the new node
    async fn create_folder(&self, folder: &NewFolder) -> anyhow::Result<RemoteNode>;

    /// Upload a file and return the new node (carrying its checksum)
    async fn upload_file(&self, file: &NewFile) -> anyhow::Result<RemoteNode>;

    /// Delete a node
    async fn delete_node(&self, id: &RemoteId) -> anyhow::Result<()>;

    /// Whether this store can delete nodes at all
    ///
    /// A store without the capability never receives `delete_node` calls.
    fn supports_delete(&self) -> bool {
        true
    }
}
