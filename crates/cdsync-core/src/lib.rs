//! cdsync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `LocalTree`, `RemoteTree`, `SyncPlan`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `ICredentialProvider`
//! - **Configuration** - YAML configuration with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure data structures with no I/O.
//! Ports define trait interfaces that adapter crates implement; the sync
//! engine only ever talks to the remote store through them.

pub mod config;
pub mod domain;
pub mod ports;
