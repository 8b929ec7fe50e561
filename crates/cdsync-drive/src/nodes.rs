//! Node JSON returned by the cloud drive service
//!
//! Listing responses look like
//!
//! ```json
//! {
//!   "count": 2,
//!   "nextToken": "kgkbpodpt6",
//!   "data": [
//!     { "id": "root-id", "kind": "FOLDER", "isRoot": true, "parents": [] },
//!     {
//!       "id": "file-id",
//!       "name": "IMG001.jpg",
//!       "kind": "FILE",
//!       "parents": ["root-id"],
//!       "labels": ["image-sync"],
//!       "contentProperties": { "md5": "f97c5d29941bfb1b2fdab0874906ab82", "size": 3 }
//!     }
//!   ]
//! }
//! ```
//!
//! Upload and folder-creation responses are a single node object.

use serde::{Deserialize, Serialize};
use tracing::debug;

use cdsync_core::domain::{Checksum, RemoteId, RemoteKind, RemoteNode};
use cdsync_core::ports::{ListQuery, NodePage};

use crate::DriveError;

/// A node as serialized by the service
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiNode {
    id: String,
    /// Absent on the root folder
    #[serde(default)]
    name: Option<String>,
    kind: String,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    is_root: bool,
    #[serde(default)]
    #[allow(dead_code)]
    labels: Vec<String>,
    content_properties: Option<ContentProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentProperties {
    md5: Option<String>,
    size: Option<u64>,
    #[allow(dead_code)]
    content_type: Option<String>,
}

/// One page of a listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeList {
    #[serde(default)]
    data: Vec<ApiNode>,
    count: Option<u64>,
    next_token: Option<String>,
}

/// Metadata sent when creating a folder or uploading a file
#[derive(Debug, Serialize)]
pub(crate) struct NodeMetadata<'a> {
    pub name: &'a str,
    pub kind: RemoteKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<&'a str>,
    pub parents: Vec<&'a str>,
}

/// Filter expression for a listing query
///
/// Queries without an explicit filter select every node of their kind.
pub fn listing_filter(query: &ListQuery) -> String {
    query
        .filter
        .clone()
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| format!("kind:{}", query.kind))
}

/// Converts service JSON into domain nodes
pub struct NodeParser;

impl NodeParser {
    /// Parse a single node
    ///
    /// # Errors
    /// [`DriveError::InvalidResponse`] for an unknown kind, an invalid id or
    /// a malformed checksum
    pub(crate) fn parse_node(node: ApiNode) -> Result<RemoteNode, DriveError> {
        let kind: RemoteKind = node
            .kind
            .parse()
            .map_err(|e| DriveError::InvalidResponse(format!("node {}: {e}", node.id)))?;

        let id = RemoteId::new(node.id)
            .map_err(|e| DriveError::InvalidResponse(e.to_string()))?;

        let parents = node
            .parents
            .into_iter()
            .map(RemoteId::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DriveError::InvalidResponse(format!("node {id}: {e}")))?;

        let (checksum, size) = match node.content_properties {
            Some(props) => {
                let checksum = props
                    .md5
                    .map(Checksum::new)
                    .transpose()
                    .map_err(|e| DriveError::InvalidResponse(format!("node {id}: {e}")))?;
                (checksum, props.size)
            }
            None => (None, None),
        };

        let name = node.name.unwrap_or_default();
        let remote = match kind {
            RemoteKind::Folder => RemoteNode::folder(id, name, parents),
            RemoteKind::File => RemoteNode {
                size,
                ..RemoteNode::file(id, name, parents, checksum)
            },
        };

        Ok(if node.is_root { remote.into_root() } else { remote })
    }

    /// Parse a listing page
    ///
    /// Nodes of kinds other than `FILE` and `FOLDER` (assets, groups) are
    /// skipped.
    pub(crate) fn parse_page(list: NodeList) -> Result<NodePage, DriveError> {
        let mut nodes = Vec::with_capacity(list.data.len());
        for node in list.data {
            if node.kind.parse::<RemoteKind>().is_err() {
                debug!(id = %node.id, kind = %node.kind, "Skipping node of unsupported kind");
                continue;
            }
            nodes.push(Self::parse_node(node)?);
        }

        Ok(NodePage {
            nodes,
            next_token: list.next_token.filter(|t| !t.is_empty()),
            count: list.count,
        })
    }
}
