//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Remote folder/file listing, creation, upload, delete
//! - [`ICredentialProvider`] - Always-current bearer credential

pub mod credentials;
pub mod remote_store;

pub use credentials::{ICredentialProvider, Tokens};
pub use remote_store::{IRemoteStore, ListQuery, NewFile, NewFolder, NodePage};
