//! Replicated State Module
//!
//! Holds the cluster-wide view of which process kinds are operational on
//! which node.
//!
//! ## Core Concepts
//! - **Full replication**: Every member keeps the whole `operational_processes` table.
//! - **Versions**: Each write carries a version; replicas keep the newest one.
//! - **Anti-Entropy**: Members exchange full dumps when a peer joins and periodically.
//! - **Tombstones**: Removed keys remember the removed version and reject older copies.

pub mod handlers;
pub mod protocol;
pub mod status;
pub mod types;
