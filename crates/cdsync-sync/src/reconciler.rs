//! Tree reconciler
//!
//! Matches the local tree against the remote listing in two passes:
//!
//! 1. **Folder mapping** binds every local directory to a remote folder id,
//!    creating missing folders. It runs strictly sequentially in the
//!    scanner's parent-first order: a child's lookup needs its parent's id,
//!    which may have just been created.
//! 2. **File classification** groups remote files by parent id and decides,
//!    for each local file, whether a remote copy already exists.
//!
//! Remote files left unmatched become delete candidates.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};

use cdsync_core::domain::{
    names_match, FolderBinding, LocalNode, LocalTree, RemoteId, RemoteNode, RemoteTree, SyncPlan,
};
use cdsync_core::ports::{IRemoteStore, NewFolder};

/// Folder mapping counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderStats {
    /// Directories bound to an existing remote folder
    pub matched: usize,
    /// Folders created on the remote
    pub created: usize,
    /// Folders that would be created (dry run)
    pub planned: usize,
}

/// Bind every local directory to a remote folder
///
/// The scan root is looked up (or created) under the remote root. Under
/// `dry_run` nothing is created: a directory missing remotely, and every
/// directory below it, is bound to [`FolderBinding::Planned`].
///
/// Created folders are added to `remote` so that later lookups see them.
pub async fn map_folders(
    store: &dyn IRemoteStore,
    local: &mut LocalTree,
    remote: &mut RemoteTree,
    dry_run: bool,
) -> Result<FolderStats> {
    let mut stats = FolderStats::default();
    let remote_root = FolderBinding::Remote(remote.root().id.clone());

    for dir in local.directories().to_vec() {
        let parent = if local[dir].is_root() {
            remote_root.clone()
        } else {
            local.parent_binding(dir).cloned().ok_or_else(|| {
                anyhow!(
                    "directory {} visited before its parent was mapped",
                    local[dir].path.display()
                )
            })?
        };

        let binding = match parent {
            FolderBinding::Planned => {
                stats.planned += 1;
                FolderBinding::Planned
            }
            FolderBinding::Remote(parent_id) => {
                resolve_folder(store, remote, &local[dir], parent_id, dry_run, &mut stats).await?
            }
        };

        if let Some(node) = local.get_mut(dir) {
            node.binding = Some(binding);
        }
    }

    info!(
        matched = stats.matched,
        created = stats.created,
        planned = stats.planned,
        "Folders mapped"
    );
    Ok(stats)
}

async fn resolve_folder(
    store: &dyn IRemoteStore,
    remote: &mut RemoteTree,
    dir: &LocalNode,
    parent_id: RemoteId,
    dry_run: bool,
    stats: &mut FolderStats,
) -> Result<FolderBinding> {
    if let Some(existing) = remote.find_child(&parent_id, &dir.name) {
        debug!(path = %dir.path.display(), id = %existing.id, "Folder exists");
        stats.matched += 1;
        return Ok(FolderBinding::Remote(existing.id.clone()));
    }

    if dry_run {
        info!(path = %dir.path.display(), parent = %parent_id, "Would create folder");
        stats.planned += 1;
        return Ok(FolderBinding::Planned);
    }

    let request = NewFolder {
        name: dir.name.clone(),
        parents: vec![parent_id],
    };
    let created = store
        .create_folder(&request)
        .await
        .with_context(|| format!("Failed to create folder for {}", dir.path.display()))?;
    info!(path = %dir.path.display(), id = %created.id, "Folder created");

    let id = created.id.clone();
    remote.insert(created)?;
    stats.created += 1;
    Ok(FolderBinding::Remote(id))
}

/// Whether a remote node is the same file as a local one
///
/// Names compare case-insensitively; with `compare_checksums` both sides
/// must also carry equal checksums.
fn is_same_file(local: &LocalNode, remote: &RemoteNode, compare_checksums: bool) -> bool {
    if !names_match(&local.name, &remote.name) {
        return false;
    }
    if !compare_checksums {
        return true;
    }
    matches!((&local.checksum, &remote.checksum), (Some(l), Some(r)) if l == r)
}

/// Split local files into uploads and matches, and collect delete candidates
///
/// Expects every directory to be bound already (see [`map_folders`]).
pub fn classify_files(
    local: &LocalTree,
    remote_files: &[RemoteNode],
    compare_checksums: bool,
) -> SyncPlan {
    let mut by_parent: HashMap<&RemoteId, Vec<&RemoteNode>> = HashMap::new();
    for node in remote_files {
        for parent in &node.parents {
            by_parent.entry(parent).or_default().push(node);
        }
    }

    let mut plan = SyncPlan::default();
    for &id in local.files() {
        let file = &local[id];
        match local.parent_binding(id) {
            Some(FolderBinding::Remote(parent)) => {
                let found = by_parent
                    .get(parent)
                    .and_then(|group| group.iter().find(|r| is_same_file(file, r, compare_checksums)));
                match found {
                    Some(remote) => {
                        debug!(path = %file.path.display(), id = %remote.id, "File already present");
                        plan.kept.insert(remote.id.clone());
                    }
                    None => plan.files_to_upload.push(id),
                }
            }
            Some(FolderBinding::Planned) => plan.files_to_upload.push(id),
            None => warn!(path = %file.path.display(), "Parent folder not mapped, skipping"),
        }
    }

    plan.files_to_delete = delete_candidates(remote_files, &plan.kept);

    info!(
        upload = plan.files_to_upload.len(),
        kept = plan.kept.len(),
        delete_candidates = plan.files_to_delete.len(),
        "Files classified"
    );
    plan
}

/// Remote files whose id was never matched by a local file
pub fn delete_candidates(remote_files: &[RemoteNode], kept: &HashSet<RemoteId>) -> Vec<RemoteNode> {
    remote_files
        .iter()
        .filter(|n| !kept.contains(&n.id))
        .cloned()
        .collect()
}
