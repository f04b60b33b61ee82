//! Cluster Application-State Coordinator
//!
//! Lets the processes of a multi-node deployment agree on shared
//! application state: which process kinds are operational on which node, and
//! which single node holds a named leader role.
//!
//! ## Architecture Modules
//! - **`membership`**: UDP gossip (SWIM-like) membership with a static seed list,
//!   failure detection and named cluster groups.
//! - **`storage`**: The fully replicated `operational_processes` table with
//!   change notification and anti-entropy.
//! - **`election`**: Check-lock-check leader election against a per-role authority.
//! - **`coordinator`**: The per-node facade (`AppStateCluster`) and its local
//!   listener registry.
//! - **`rpc`**: Internal HTTP API and client used between nodes.
//! - **`config`** / **`error`**: Settings and the crate error type.

pub mod config;
pub mod coordinator;
pub mod election;
pub mod error;
pub mod membership;
pub mod rpc;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::ClusterSettings;
pub use coordinator::cluster::{AppStateCluster, CoordinatorState};
pub use error::{ClusterError, ClusterResult};
pub use membership::types::NodeId;
pub use storage::types::{ClusterProcess, ProcessKind};
