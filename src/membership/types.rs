use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

/// Offset between a node's gossip port and its internal RPC port.
pub const RPC_PORT_OFFSET: u16 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NodeState {
    Alive,
    Suspect,
    Dead,
}

/// Represents a single member in the cluster.
///
/// Contains identity, network addressing, and current lifecycle state.
/// The `incarnation` field is a logical clock used to order updates and resolve conflicts
/// (e.g., refuting a false "Suspect" claim).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Local hostname, when it could be resolved.
    pub name: Option<String>,
    pub gossip_addr: SocketAddr,
    pub rpc_addr: SocketAddr,
    pub state: NodeState,
    pub incarnation: u64,
    /// Bind time in microseconds since the epoch. Fixed for the node's lifetime,
    /// so every view ranks a member the same way.
    pub started_at: u64,

    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

impl Node {
    /// Orders members by age, oldest first. Ties fall back to the id.
    pub fn seniority(&self) -> (u64, &NodeId) {
        (self.started_at, &self.id)
    }
}

/// Membership change event.
#[derive(Debug, Clone)]
pub enum MembershipEvent {
    Joined(Node),
    Left(NodeId),
}

/// The wire protocol for inter-node communication.
///
/// - `Ping/Ack`: Used for liveness checks and state synchronization.
/// - `Join`: Sent by new nodes to seed nodes to enter the cluster, answered with an `Ack`.
/// - `Suspect/Alive`: Disseminates changes in node health.
/// - `Leave`: Sent by a node that is shutting down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GossipMessage {
    Ping {
        from: NodeId,
        incarnation: u64,
        started_at: u64,
    },

    Ack {
        from: NodeId,
        incarnation: u64,
        members: Vec<Node>,
    },

    Join {
        node: Node,
    },

    Suspect {
        node_id: NodeId,
        incarnation: u64,
    },

    Alive {
        node_id: NodeId,
        incarnation: u64,
    },

    Leave {
        node_id: NodeId,
    },
}

/// Every datagram is tagged with the cluster name so that groups sharing a
/// network (or a port range) ignore each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub cluster: String,
    pub message: GossipMessage,
}
