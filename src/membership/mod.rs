//! Membership & Discovery Module
//!
//! SWIM-style gossip membership over UDP. Each node keeps its own view of
//! the group; views converge through pings, acks and dissemination.
//!
//! ## Core Mechanisms
//! - **Static Join**: Nodes enter through a configured seed list only, with a bounded
//!   number of handshake attempts per seed. No seeds means founding a new group.
//! - **Failure Detection**: "Alive" -> "Suspect" -> "Dead" on silence, refuted with
//!   higher incarnation numbers.
//! - **Departure**: A closing node broadcasts `Leave` so peers drop it at once.
//! - **Cluster Names**: Every datagram carries the group name; foreign groups are ignored.
//! - **Events**: `Joined` / `Left` are published on a broadcast channel.

pub mod service;
pub mod types;

#[cfg(test)]
mod tests;
