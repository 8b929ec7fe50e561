//! Remote lister
//!
//! Pages through a listing query one request at a time: each request carries
//! the continuation token of the previous response. Any page failure fails
//! the whole listing.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, instrument};

use cdsync_core::domain::{RemoteKind, RemoteNode, RemoteTree};
use cdsync_core::ports::{IRemoteStore, ListQuery};

/// Fetch every node matching `query`
#[instrument(skip(store), fields(kind = %query.kind))]
pub async fn list_all(store: &dyn IRemoteStore, query: &ListQuery) -> Result<Vec<RemoteNode>> {
    let mut nodes = Vec::new();
    let mut token: Option<String> = None;
    let mut seen: HashSet<String> = HashSet::new();

    loop {
        let page = store
            .list_page(query, token.as_deref())
            .await
            .with_context(|| format!("Failed to list {} nodes", query.kind))?;

        nodes.extend(page.nodes);
        debug!(fetched = nodes.len(), count = ?page.count, "Listing page received");

        match page.next_token {
            Some(next) if !next.is_empty() => {
                if !seen.insert(next.clone()) {
                    bail!("Listing returned continuation token {next} a second time");
                }
                token = Some(next);
            }
            _ => break,
        }
    }

    let before = nodes.len();
    nodes.retain(|n| n.kind == query.kind);
    if nodes.len() != before {
        debug!(skipped = before - nodes.len(), "Dropped nodes of another kind");
    }

    Ok(nodes)
}

/// List every remote folder and link them into a tree
pub async fn list_folders(store: &dyn IRemoteStore) -> Result<RemoteTree> {
    let nodes = list_all(store, &ListQuery::folders()).await?;
    let tree = RemoteTree::build(nodes).context("Remote folder listing is inconsistent")?;
    info!(folders = tree.len(), root = %tree.root().id, "Remote folders listed");
    Ok(tree)
}

/// List remote files, optionally narrowed by a backend filter
pub async fn list_files(store: &dyn IRemoteStore, filter: Option<String>) -> Result<Vec<RemoteNode>> {
    let nodes = list_all(store, &ListQuery::files(filter)).await?;
    debug_assert!(nodes.iter().all(|n| n.kind == RemoteKind::File));
    info!(files = nodes.len(), "Remote files listed");
    Ok(nodes)
}
