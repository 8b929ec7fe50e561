//! cdsync Sync - One-way reconciliation pipeline
//!
//! Provides:
//! - Local tree scanning without following symlinks
//! - Streaming MD5 hashing with bounded concurrency
//! - Paginated remote listing
//! - Folder mapping and file classification
//! - Bounded, retried uploads and deletions
//!
//! ## Modules
//!
//! - [`scanner`] - Walks the local root into a [`LocalTree`](cdsync_core::domain::LocalTree)
//! - [`hasher`] - Content checksums
//! - [`lister`] - Remote listing pagination
//! - [`reconciler`] - Folder mapping, file classification, delete candidates
//! - [`transfer`] - Upload/delete orchestration with retry
//! - [`pipeline`] - Stage sequencing over a shared context

pub mod executor;
pub mod hasher;
pub mod lister;
pub mod pipeline;
pub mod reconciler;
pub mod scanner;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred while scanning or reading a file
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scan root is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The configured file pattern does not compile
    #[error("Invalid file pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A domain-level error propagated from cdsync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] cdsync_core::domain::DomainError),

    /// A transfer item failed on every allowed attempt
    #[error("{operation} failed after {attempts} attempts")]
    RetryExhausted {
        /// Description of the operation
        operation: String,
        /// Attempts made (retries + 1)
        attempts: u32,
    },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
