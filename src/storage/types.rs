use crate::membership::types::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of workload hosted by a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    App,
    Elasticsearch,
    WebServer,
    ComputeEngine,
}

impl ProcessKind {
    pub const ALL: [ProcessKind; 4] = [
        ProcessKind::App,
        ProcessKind::Elasticsearch,
        ProcessKind::WebServer,
        ProcessKind::ComputeEngine,
    ];

    /// Short stable key, used in logs and on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            ProcessKind::App => "app",
            ProcessKind::Elasticsearch => "es",
            ProcessKind::WebServer => "web",
            ProcessKind::ComputeEngine => "ce",
        }
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ProcessKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessKind::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| format!("Unknown process kind: {}", s))
    }
}

/// A process instance: one process kind on one node.
///
/// Immutable; equality and hashing cover both fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ClusterProcess {
    owner: NodeId,
    kind: ProcessKind,
}

impl ClusterProcess {
    pub fn new(owner: NodeId, kind: ProcessKind) -> Self {
        Self { owner, kind }
    }

    pub fn owner(&self) -> &NodeId {
        &self.owner
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }
}
