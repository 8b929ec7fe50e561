//! Domain entities and business logic
//!
//! This module contains the core domain types for cdsync:
//! - Newtypes for remote identifiers and content checksums
//! - The local tree arena produced by the scanner
//! - The remote tree arena produced by the lister
//! - The sync plan computed by the reconciler
//! - Name normalization shared by every comparison
//! - Domain-specific error types

pub mod errors;
pub mod local_tree;
pub mod names;
pub mod newtypes;
pub mod plan;
pub mod remote_tree;

// Re-export commonly used types
pub use errors::DomainError;
pub use local_tree::{FolderBinding, LocalNode, LocalNodeId, LocalTree};
pub use names::{names_match, normalize_name};
pub use newtypes::{Checksum, RemoteId};
pub use plan::SyncPlan;
pub use remote_tree::{RemoteKind, RemoteNode, RemoteTree};
