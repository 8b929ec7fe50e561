//! Transfer orchestrator
//!
//! Executes the uploads and deletions of a [`SyncPlan`](cdsync_core::domain::SyncPlan)
//! with independent concurrency limits. Every item is wrapped in a bounded
//! retry; an item that exhausts its budget aborts the rest of its batch.
//!
//! ## Retry Logic
//!
//! Every failure is retried. With `retries = n` an item gets `n + 1`
//! attempts; the delay before retry `k` is `base_delay * 2^k`, capped at
//! `max_delay`.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use cdsync_core::config::TransferConfig;
use cdsync_core::domain::{FolderBinding, LocalNodeId, LocalTree, RemoteNode};
use cdsync_core::ports::{IRemoteStore, NewFile};

use crate::executor::BoundedExecutor;
use crate::SyncError;

/// Upload sets smaller than this are logged file by file
const LIST_FILES_BELOW: usize = 100;

/// Per-item retry budget and backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt
    pub retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
            max_delay,
        }
    }

    /// Total attempts allowed
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before retry number `attempt` (0-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Executes an async operation, retrying every failure per `policy`
///
/// The error of the last attempt is returned with a
/// [`SyncError::RetryExhausted`] context.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < policy.retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(err.context(SyncError::RetryExhausted {
                    operation: operation.to_string(),
                    attempts: attempt + 1,
                }));
            }
        }
    }
}

/// Settings for the transfer stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub parallel_uploads: usize,
    pub parallel_deletes: usize,
    pub upload_retry: RetryPolicy,
    pub delete_retry: RetryPolicy,
    /// Issue no mutating call at all
    pub dry_run: bool,
    /// Act on delete candidates
    pub delete_enabled: bool,
}

impl TransferOptions {
    /// Build from the `transfer` config section plus the sync flags
    #[must_use]
    pub fn from_config(config: &TransferConfig, dry_run: bool, delete_enabled: bool) -> Self {
        let base = Duration::from_millis(config.retry_base_delay_ms);
        let max = Duration::from_millis(config.retry_max_delay_ms);
        Self {
            parallel_uploads: config.parallel_uploads,
            parallel_deletes: config.parallel_deletes,
            upload_retry: RetryPolicy::new(config.upload_retries, base, max),
            delete_retry: RetryPolicy::new(config.delete_retries, base, max),
            dry_run,
            delete_enabled,
        }
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default(), false, false)
    }
}

/// Upload `files`, parented to their directories' remote folders
///
/// Files are sent in path order. Under dry run nothing is sent and the
/// number of files that would be uploaded is returned.
pub async fn upload_files(
    store: &dyn IRemoteStore,
    tree: &LocalTree,
    files: &[LocalNodeId],
    options: &TransferOptions,
) -> Result<usize> {
    let mut jobs: Vec<(PathBuf, LocalNodeId, Option<NewFile>)> = files
        .iter()
        .map(|&id| {
            let node = &tree[id];
            let job = match tree.parent_binding(id) {
                Some(FolderBinding::Remote(parent)) => Some(NewFile {
                    name: node.name.clone(),
                    path: node.path.clone(),
                    parents: vec![parent.clone()],
                }),
                _ => None,
            };
            (node.path.clone(), id, job)
        })
        .collect();
    jobs.sort_by(|a, b| a.0.cmp(&b.0));

    info!(files = jobs.len(), dry_run = options.dry_run, "Uploading files");
    if jobs.len() < LIST_FILES_BELOW {
        for (path, id, _) in &jobs {
            let shown = tree.relative_path(*id).unwrap_or(path.as_path());
            info!(path = %shown.display(), "Queued for upload");
        }
    }

    if options.dry_run {
        info!(files = jobs.len(), "Dry run, skipping uploads");
        return Ok(jobs.len());
    }

    let jobs = jobs
        .into_iter()
        .map(|(path, _, job)| job.ok_or_else(|| anyhow!("No remote folder for {}", path.display())))
        .collect::<Result<Vec<NewFile>>>()?;

    let uploaded = BoundedExecutor::new(options.parallel_uploads)
        .run(jobs, |job| async move {
            let operation = format!("upload {}", job.path.display());
            let node = with_retry(&options.upload_retry, &operation, || store.upload_file(&job)).await?;
            info!(path = %job.path.display(), id = %node.id, "Uploaded");
            Ok::<_, anyhow::Error>(node)
        })
        .await?;

    Ok(uploaded.len())
}

/// Delete remote nodes, if deletion is enabled
///
/// Returns the number deleted. Zero calls are made under dry run, when
/// deletion is disabled, or when the store cannot delete.
pub async fn delete_nodes(
    store: &dyn IRemoteStore,
    nodes: &[RemoteNode],
    options: &TransferOptions,
) -> Result<usize> {
    if nodes.is_empty() {
        return Ok(0);
    }

    let reason = if options.dry_run {
        Some("dry run")
    } else if !options.delete_enabled {
        Some("deletion disabled")
    } else if !store.supports_delete() {
        Some("store cannot delete")
    } else {
        None
    };
    if let Some(reason) = reason {
        info!(candidates = nodes.len(), reason, "Skipping remote deletions");
        return Ok(0);
    }

    info!(files = nodes.len(), "Deleting remote files");
    let deleted = BoundedExecutor::new(options.parallel_deletes)
        .run(nodes, |node| async move {
            let operation = format!("delete {} ({})", node.name, node.id);
            with_retry(&options.delete_retry, &operation, || store.delete_node(&node.id)).await?;
            info!(name = %node.name, id = %node.id, "Deleted");
            Ok::<_, anyhow::Error>(())
        })
        .await?;

    Ok(deleted.len())
}
