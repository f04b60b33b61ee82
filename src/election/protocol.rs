//! Election Network Protocol
//!
//! Endpoints and DTOs used to reach a role's authority and to replicate
//! leader slots. All payloads are JSON over the internal RPC port.

use crate::membership::types::NodeId;
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

pub const ENDPOINT_LEADER_GET: &str = "/internal/leader/get";
/// Set-if-empty on the authority.
pub const ENDPOINT_LEADER_SET: &str = "/internal/leader/set";
/// Slot values pushed by an authority to the other replicas.
pub const ENDPOINT_LEADER_REPLICATE: &str = "/internal/leader/replicate";
pub const ENDPOINT_LEADER_DUMP: &str = "/internal/leader/dump";
pub const ENDPOINT_LOCK_ACQUIRE: &str = "/internal/lock/acquire";
pub const ENDPOINT_LOCK_RELEASE: &str = "/internal/lock/release";

// --- Data Transfer Objects ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderSlotRecord {
    pub role: String,
    pub holder: NodeId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderQuery {
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderSlotResponse {
    pub holder: Option<NodeId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicateLeadersRequest {
    pub slots: Vec<LeaderSlotRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicateLeadersResponse {
    pub applied: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderDumpResponse {
    pub slots: Vec<LeaderSlotRecord>,
}

/// Names a lock and the node acting on it.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockRequest {
    pub name: String,
    pub holder: NodeId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LockResponse {
    pub success: bool,
}
