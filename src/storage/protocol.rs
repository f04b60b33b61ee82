//! Storage Network Protocol
//!
//! Defines the API endpoints and Data Transfer Objects (DTOs) used to replicate
//! the operational-process table between nodes.
//!
//! These structures are serialized as JSON and sent over HTTP to the internal
//! RPC port of each peer.

use super::types::ClusterProcess;
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Endpoint receiving status writes pushed by a peer.
pub const ENDPOINT_STATUS_REPLICATE: &str = "/internal/status/replicate";
/// Endpoint receiving removals pushed by a peer (shutdown purge).
pub const ENDPOINT_STATUS_REMOVE: &str = "/internal/status/remove";
/// Internal endpoint for bulk transfer of the whole table (Anti-Entropy).
pub const ENDPOINT_STATUS_DUMP: &str = "/internal/status/dump";

// --- Data Transfer Objects ---

/// One replicated entry of the table.
///
/// `version` orders writes to the same key; a replica keeps the highest
/// version it has seen, so retried or reordered deliveries are harmless.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusRecord {
    pub process: ClusterProcess,
    pub operational: bool,
    pub version: u64,
}

/// Marks a removed entry. Records at or below `version` stay removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tombstone {
    pub process: ClusterProcess,
    pub version: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicateStatusRequest {
    pub records: Vec<StatusRecord>,
    #[serde(default)]
    pub tombstones: Vec<Tombstone>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveStatusRequest {
    pub tombstones: Vec<Tombstone>,
}

/// Standard acknowledgment for replication requests.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicateStatusResponse {
    /// Number of records that changed the receiving replica.
    pub applied: usize,
}

/// Response format for dump requests (Anti-Entropy).
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusDumpResponse {
    pub records: Vec<StatusRecord>,
    #[serde(default)]
    pub tombstones: Vec<Tombstone>,
}
