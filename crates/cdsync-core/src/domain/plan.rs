//! Sync plan produced by reconciliation

use std::collections::HashSet;

use super::local_tree::LocalNodeId;
use super::newtypes::RemoteId;
use super::remote_tree::RemoteNode;

/// Outcome of classifying local files against the remote listing
///
/// Built fresh for every run and discarded afterwards. Folder mapping
/// happens before classification and reports its own counters.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Local files with no matching remote node
    pub files_to_upload: Vec<LocalNodeId>,
    /// Remote files not matched by any local file
    pub files_to_delete: Vec<RemoteNode>,
    /// Remote file ids matched by a local file
    pub kept: HashSet<RemoteId>,
}

impl SyncPlan {
    /// Whether a remote node was matched by a local file
    #[must_use]
    pub fn is_kept(&self, id: &RemoteId) -> bool {
        self.kept.contains(id)
    }

    /// Whether the plan requires no upload
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.files_to_upload.is_empty()
    }
}
