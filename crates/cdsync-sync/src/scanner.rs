//! Local tree scanner
//!
//! Walks the scan root with `lstat` semantics: symbolic links are recorded as
//! leaves and never followed, so the walk cannot loop. Each directory's
//! entries are stat'ed with bounded concurrency. The first I/O error aborts
//! the scan and no partial tree is returned.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use cdsync_core::domain::{LocalNode, LocalNodeId, LocalTree};

use crate::executor::BoundedExecutor;
use crate::SyncError;

/// Default number of concurrent `lstat` calls per directory
pub const DEFAULT_SCAN_CONCURRENCY: usize = 20;

/// Builds a [`LocalTree`] from the filesystem
#[derive(Debug, Clone)]
pub struct Scanner {
    executor: BoundedExecutor,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_CONCURRENCY)
    }
}

fn timestamp(value: std::io::Result<std::time::SystemTime>) -> Option<DateTime<Utc>> {
    value.ok().map(DateTime::<Utc>::from)
}

#[cfg(unix)]
fn change_time(metadata: &Metadata) -> Option<DateTime<Utc>> {
    use std::os::unix::fs::MetadataExt;
    let nanos = u32::try_from(metadata.ctime_nsec()).unwrap_or(0);
    DateTime::from_timestamp(metadata.ctime(), nanos)
}

// No inode change time outside unix; the birth time is the nearest value.
#[cfg(not(unix))]
fn change_time(metadata: &Metadata) -> Option<DateTime<Utc>> {
    timestamp(metadata.created())
}

fn node_from_metadata(name: String, path: PathBuf, metadata: &Metadata) -> LocalNode {
    let file_type = metadata.file_type();
    let node = if file_type.is_symlink() {
        LocalNode::symlink(name, path, metadata.len())
    } else if file_type.is_dir() {
        LocalNode::directory(name, path)
    } else {
        LocalNode::file(name, path, metadata.len())
    };
    node.with_times(
        timestamp(metadata.modified()),
        timestamp(metadata.accessed()),
        change_time(metadata),
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl Scanner {
    /// Create a scanner with at most `max_concurrent` stats in flight
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            executor: BoundedExecutor::new(max_concurrent),
        }
    }

    /// Scan `root` into a tree
    ///
    /// The root path is made absolute; it must be a directory.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub async fn scan(&self, root: &Path) -> Result<LocalTree, SyncError> {
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| SyncError::io(root, e))?;
        let metadata = tokio::fs::symlink_metadata(&root)
            .await
            .map_err(|e| SyncError::io(&root, e))?;
        if !metadata.is_dir() {
            return Err(SyncError::NotADirectory(root));
        }

        let mut tree = LocalTree::new(node_from_metadata(
            display_name(&root),
            root.clone(),
            &metadata,
        ));

        // Depth-first; a directory is inserted before anything below it.
        let mut pending: Vec<(LocalNodeId, PathBuf)> = vec![(tree.root(), root)];
        while let Some((dir_id, dir_path)) = pending.pop() {
            let children = self.expand(&dir_path).await?;
            debug!(dir = %dir_path.display(), entries = children.len(), "Expanded directory");

            let mut subdirs = Vec::new();
            for child in children {
                let is_dir = child.is_directory;
                let path = child.path.clone();
                let id = tree.add_child(dir_id, child)?;
                if is_dir {
                    subdirs.push((id, path));
                }
            }
            // Reverse so the first sibling is expanded first.
            pending.extend(subdirs.into_iter().rev());
        }

        info!(
            files = tree.files().len(),
            directories = tree.directories().len(),
            total_size = tree.total_size(),
            "Local scan complete"
        );
        Ok(tree)
    }

    /// List a directory and `lstat` every entry, sorted by name
    async fn expand(&self, dir: &Path) -> Result<Vec<LocalNode>, SyncError> {
        let mut reader = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| SyncError::io(dir, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| SyncError::io(dir, e))?
        {
            entries.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        self.executor
            .run_ordered(entries, |(name, path)| async move {
                let metadata = tokio::fs::symlink_metadata(&path)
                    .await
                    .map_err(|e| SyncError::io(&path, e))?;
                Ok(node_from_metadata(name, path, &metadata))
            })
            .await
    }
}
