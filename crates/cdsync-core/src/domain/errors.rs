//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including identifier and checksum validation and tree integrity checks.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid checksum format (expected 32 hex digits)
    #[error("Invalid checksum: {0}")]
    InvalidChecksum(String),

    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Unknown node kind reported by the remote store
    #[error("Invalid node kind: {0}")]
    InvalidKind(String),

    /// A tree has no node flagged as root
    #[error("Tree has no root node")]
    MissingRoot,

    /// A tree has more than one node flagged as root
    #[error("Tree has {count} root nodes, expected exactly one")]
    MultipleRoots {
        /// Number of nodes flagged as root
        count: usize,
    },

    /// A node is its own ancestor
    #[error("Cycle detected at node {0}")]
    Cycle(String),

    /// A node references a parent or child that is not part of the tree
    #[error("Dangling reference from node {node} to {target}")]
    DanglingReference {
        /// The node holding the reference
        node: String,
        /// The missing target
        target: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
