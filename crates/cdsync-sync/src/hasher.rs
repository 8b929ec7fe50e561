//! Content hasher
//!
//! Streams each file through MD5 (the digest the remote store reports) in
//! fixed-size chunks, so file size never drives memory use.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument};

use cdsync_core::domain::{Checksum, LocalNodeId, LocalTree};

use crate::executor::BoundedExecutor;
use crate::SyncError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the MD5 checksum of a file
pub async fn md5_file(path: &Path) -> Result<Checksum, SyncError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| SyncError::io(path, e))?;

    let mut hasher = Md5::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| SyncError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(Checksum::new(format!("{:x}", hasher.finalize()))?)
}

/// Hashes the files of a [`LocalTree`] with bounded concurrency
#[derive(Debug, Clone)]
pub struct ContentHasher {
    executor: BoundedExecutor,
}

impl ContentHasher {
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self {
            executor: BoundedExecutor::new(concurrency),
        }
    }

    /// Set the checksum of every listed file; returns the number hashed
    ///
    /// Fails on the first file that cannot be read.
    #[instrument(skip(self, tree), fields(files = tree.files().len()))]
    pub async fn hash_tree(&self, tree: &mut LocalTree) -> Result<usize, SyncError> {
        let jobs: Vec<(LocalNodeId, PathBuf)> = tree
            .files()
            .iter()
            .map(|id| (*id, tree[*id].path.clone()))
            .collect();

        let results = self
            .executor
            .run(jobs, |(id, path)| async move {
                let checksum = md5_file(&path).await?;
                debug!(path = %path.display(), %checksum, "Hashed file");
                Ok::<_, SyncError>((id, checksum))
            })
            .await?;

        let hashed = results.len();
        for (id, checksum) in results {
            if let Some(node) = tree.get_mut(id) {
                node.checksum = Some(checksum);
            }
        }

        info!(hashed, "Checksums computed");
        Ok(hashed)
    }
}
