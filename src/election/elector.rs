//! Check-lock-check leader election.
//!
//! For every role there is one *authority*: the oldest alive member. It hosts
//! the role's lock and the authoritative slot, and pushes the slot to every
//! other member once it is set.
//!
//! Age is fixed at bind time and a newcomer always ranks last, so members
//! whose views have not converged on a newcomer still pick the same authority.

use super::lock::LockTable;
use super::protocol::{
    ENDPOINT_LEADER_DUMP, ENDPOINT_LEADER_GET, ENDPOINT_LEADER_REPLICATE, ENDPOINT_LEADER_SET,
    ENDPOINT_LOCK_ACQUIRE, ENDPOINT_LOCK_RELEASE, LeaderDumpResponse, LeaderQuery,
    LeaderSlotRecord, LeaderSlotResponse, LockRequest, LockResponse, ReplicateLeadersRequest,
    ReplicateLeadersResponse,
};
use super::slots::LeaderSlots;
use crate::error::{ClusterError, ClusterResult};
use crate::membership::service::MembershipService;
use crate::membership::types::{Node, NodeId};
use crate::rpc::client::PeerClient;

use std::sync::Arc;

/// Role of the web leader.
pub const WEB_LEADER_ROLE: &str = "web";

pub struct LeaderElector {
    membership: Arc<MembershipService>,
    peers: PeerClient,
    locks: LockTable,
    slots: LeaderSlots,
}

impl LeaderElector {
    pub fn new(membership: Arc<MembershipService>, peers: PeerClient) -> Arc<Self> {
        Arc::new(Self {
            membership,
            peers,
            locks: LockTable::new(),
            slots: LeaderSlots::new(),
        })
    }

    /// Tries to make the local node the holder of `role`.
    ///
    /// Returns `true` only for the one call that fills the slot. Once a holder
    /// exists every call returns `false`, the holder's own included.
    pub async fn try_acquire(&self, role: &str) -> ClusterResult<bool> {
        let me = self.membership.local_identity().clone();

        if self.slots.get(role).is_some() {
            return Ok(false);
        }

        let authority = self.authority(role)?;
        if self.leader_on(&authority, role).await?.is_some() {
            return Ok(false);
        }

        if let Err(e) = self.lock_on(&authority, role, &me).await {
            // The grant may have landed even though the answer was lost.
            if let Err(unlock_err) = self.unlock_on(&authority, role, &me).await {
                tracing::debug!("Best-effort unlock of '{}' failed: {}", role, unlock_err);
            }
            return Err(e);
        }

        let outcome = self.decide(&authority, role, &me).await;

        if let Err(e) = self.unlock_on(&authority, role, &me).await {
            tracing::warn!("Failed to release lock '{}' on {:?}: {}", role, authority.id, e);
        }

        if let Ok(true) = outcome {
            tracing::info!("This node is now the '{}' leader", role);
        }
        outcome
    }

    async fn decide(&self, authority: &Node, role: &str, me: &NodeId) -> ClusterResult<bool> {
        if self.leader_on(authority, role).await?.is_some() {
            return Ok(false);
        }

        let winner = self.set_on(authority, role, me).await?;
        Ok(&winner == me)
    }

    /// Current holder of `role` according to the local replica.
    pub fn leader(&self, role: &str) -> Option<NodeId> {
        self.slots.get(role)
    }

    /// Node hosting the lock and the authoritative slot for `role`.
    pub fn authority(&self, role: &str) -> ClusterResult<Node> {
        let authority = self
            .membership
            .oldest_member()
            .ok_or(ClusterError::NoMembers)?;

        tracing::trace!("Authority for '{}' is {:?}", role, authority.id);
        Ok(authority)
    }

    fn is_local(&self, node: &Node) -> bool {
        &node.id == self.membership.local_identity()
    }

    async fn leader_on(&self, authority: &Node, role: &str) -> ClusterResult<Option<NodeId>> {
        if self.is_local(authority) {
            return Ok(self.slots.get(role));
        }

        let response: LeaderSlotResponse = self
            .peers
            .post(
                authority,
                ENDPOINT_LEADER_GET,
                &LeaderQuery {
                    role: role.to_string(),
                },
            )
            .await?;

        if let Some(holder) = &response.holder {
            self.slots.apply(LeaderSlotRecord {
                role: role.to_string(),
                holder: holder.clone(),
            });
        }
        Ok(response.holder)
    }

    async fn set_on(
        &self,
        authority: &Node,
        role: &str,
        holder: &NodeId,
    ) -> ClusterResult<NodeId> {
        if self.is_local(authority) {
            return Ok(self.claim(role, holder));
        }

        let response: LeaderSlotResponse = self
            .peers
            .post(
                authority,
                ENDPOINT_LEADER_SET,
                &LeaderSlotRecord {
                    role: role.to_string(),
                    holder: holder.clone(),
                },
            )
            .await?;

        let winner = response.holder.ok_or_else(|| ClusterError::Rpc {
            endpoint: ENDPOINT_LEADER_SET.to_string(),
            status: "authority returned an empty slot".to_string(),
        })?;

        self.slots.apply(LeaderSlotRecord {
            role: role.to_string(),
            holder: winner.clone(),
        });
        Ok(winner)
    }

    async fn lock_on(&self, authority: &Node, role: &str, holder: &NodeId) -> ClusterResult<()> {
        if self.is_local(authority) {
            self.locks.acquire(role, holder).await;
            return Ok(());
        }

        let response: LockResponse = self
            .peers
            .post_blocking(
                authority,
                ENDPOINT_LOCK_ACQUIRE,
                &LockRequest {
                    name: role.to_string(),
                    holder: holder.clone(),
                },
            )
            .await?;

        if !response.success {
            return Err(ClusterError::Rpc {
                endpoint: ENDPOINT_LOCK_ACQUIRE.to_string(),
                status: "lock not granted".to_string(),
            });
        }
        Ok(())
    }

    async fn unlock_on(&self, authority: &Node, role: &str, holder: &NodeId) -> ClusterResult<()> {
        if self.is_local(authority) {
            self.locks.release(role, holder);
            return Ok(());
        }

        let _: LockResponse = self
            .peers
            .post(
                authority,
                ENDPOINT_LOCK_RELEASE,
                &LockRequest {
                    name: role.to_string(),
                    holder: holder.clone(),
                },
            )
            .await?;
        Ok(())
    }

    // --- Authority side ---

    /// Set-if-empty on this node's slot, then push the result to every replica.
    pub fn claim(&self, role: &str, holder: &NodeId) -> NodeId {
        let winner = self.slots.claim(role, holder);

        if &winner == holder {
            tracing::info!("Role '{}' assigned to {:?}", role, winner);
        }

        self.publish(vec![LeaderSlotRecord {
            role: role.to_string(),
            holder: winner.clone(),
        }]);
        winner
    }

    pub async fn acquire_lock(&self, name: &str, holder: &NodeId) {
        self.locks.acquire(name, holder).await;
    }

    pub fn release_lock(&self, name: &str, holder: &NodeId) -> bool {
        self.locks.release(name, holder)
    }

    #[cfg(test)]
    pub(crate) fn lock_holder(&self, name: &str) -> Option<NodeId> {
        self.locks.holder(name)
    }

    /// Frees locks still held by a member that left or died.
    pub fn member_departed(&self, node_id: &NodeId) {
        self.locks.release_all(node_id);
    }

    // --- Replication ---

    pub fn apply_slots(&self, records: Vec<LeaderSlotRecord>) -> usize {
        records
            .into_iter()
            .filter(|record| self.slots.apply(record.clone()))
            .count()
    }

    pub fn dump_slots(&self) -> Vec<LeaderSlotRecord> {
        self.slots.dump()
    }

    fn publish(&self, slots: Vec<LeaderSlotRecord>) {
        for peer in self.membership.get_alive_peers() {
            let client = self.peers.clone();
            let request = ReplicateLeadersRequest {
                slots: slots.clone(),
            };

            tokio::spawn(async move {
                let result: ClusterResult<ReplicateLeadersResponse> =
                    client.post(&peer, ENDPOINT_LEADER_REPLICATE, &request).await;
                if let Err(e) = result {
                    tracing::warn!("Failed to replicate leader slot to {:?}: {}", peer.id, e);
                }
            });
        }
    }

    /// Pulls every slot `node` knows about.
    pub async fn sync_from(&self, node: &Node) -> ClusterResult<usize> {
        let dump: LeaderDumpResponse = self.peers.get(node, ENDPOINT_LEADER_DUMP).await?;
        Ok(self.apply_slots(dump.slots))
    }

    pub async fn push_to(&self, node: &Node) -> ClusterResult<usize> {
        let slots = self.dump_slots();
        if slots.is_empty() {
            return Ok(0);
        }

        let response: ReplicateLeadersResponse = self
            .peers
            .post(node, ENDPOINT_LEADER_REPLICATE, &ReplicateLeadersRequest { slots })
            .await?;
        Ok(response.applied)
    }
}
