use super::protocol::LeaderSlotRecord;
use crate::membership::types::NodeId;

use dashmap::DashMap;

/// Logical name of the replicated role slots.
pub const LEADER_SLOTS: &str = "leader";

/// Per-role leader slots. A slot is written once and never cleared.
#[derive(Default)]
pub struct LeaderSlots {
    slots: DashMap<String, NodeId>,
}

impl LeaderSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, role: &str) -> Option<NodeId> {
        self.slots.get(role).map(|holder| holder.value().clone())
    }

    /// Sets the slot unless taken and returns whoever holds it afterwards.
    pub fn claim(&self, role: &str, holder: &NodeId) -> NodeId {
        self.slots
            .entry(role.to_string())
            .or_insert_with(|| holder.clone())
            .value()
            .clone()
    }

    /// Applies a replicated value. Returns `true` if the slot was empty.
    pub fn apply(&self, record: LeaderSlotRecord) -> bool {
        let mut applied = false;
        self.slots.entry(record.role.clone()).or_insert_with(|| {
            applied = true;
            record.holder.clone()
        });

        if !applied && self.get(&record.role).as_ref() != Some(&record.holder) {
            tracing::warn!(
                "Conflicting {} slot for role '{}': keeping {:?}, ignoring {:?}",
                LEADER_SLOTS,
                record.role,
                self.get(&record.role),
                record.holder
            );
        }
        applied
    }

    pub fn dump(&self) -> Vec<LeaderSlotRecord> {
        self.slots
            .iter()
            .map(|entry| LeaderSlotRecord {
                role: entry.key().clone(),
                holder: entry.value().clone(),
            })
            .collect()
    }
}
