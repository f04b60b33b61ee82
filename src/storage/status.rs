//! Replicated Operational-Process Table
//!
//! A fully replicated map `ClusterProcess -> bool`: every member keeps a
//! complete copy. Writes are applied locally and pushed to every alive peer
//! in the background, in write order per peer. Replicas converge through
//! per-key versions (highest version wins) and periodic anti-entropy dumps.
//! A removed key leaves a tombstone with the removed version, so a late copy
//! of the old record cannot bring it back.
//!
//! ## Change notification
//! Handlers registered with [`ProcessStatusTable::on_change`] run on a
//! dedicated dispatcher task, for local and remote writes alike. They fire
//! when an entry is added or updated with the value `true`, and never for
//! removals or for writes of `false`.

use super::protocol::{
    ENDPOINT_STATUS_DUMP, ENDPOINT_STATUS_REMOVE, ENDPOINT_STATUS_REPLICATE, RemoveStatusRequest,
    ReplicateStatusRequest, ReplicateStatusResponse, StatusDumpResponse, StatusRecord, Tombstone,
};
use super::types::ClusterProcess;
use crate::error::ClusterResult;
use crate::membership::service::{MembershipService, now_micros};
use crate::membership::types::{Node, NodeId};
use crate::rpc::client::PeerClient;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Logical name of the replicated table.
pub const OPERATIONAL_PROCESSES: &str = "operational_processes";

/// Upper bound on waiting for peers to acknowledge a removal.
const REMOVAL_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Handler invoked when an entry reaches `true`.
pub type ChangeHandler = Arc<dyn Fn(&ClusterProcess) + Send + Sync>;

/// Work item for a peer's replication queue.
enum Outbound {
    Records(Vec<StatusRecord>),
    Removals {
        tombstones: Vec<Tombstone>,
        done: oneshot::Sender<bool>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StatusEntry {
    operational: bool,
    version: u64,
}

pub struct ProcessStatusTable {
    entries: DashMap<ClusterProcess, StatusEntry>,
    /// Removed keys and the version they were removed at.
    tombstones: DashMap<ClusterProcess, u64>,
    handlers: Arc<DashMap<String, ChangeHandler>>,
    events: mpsc::UnboundedSender<ClusterProcess>,
    outbound: DashMap<NodeId, mpsc::UnboundedSender<Outbound>>,
    last_version: AtomicU64,
    membership: Arc<MembershipService>,
    peers: PeerClient,
    cancel_token: CancellationToken,
}

impl ProcessStatusTable {
    /// Creates the table and spawns its event dispatcher.
    pub fn new(membership: Arc<MembershipService>, peers: PeerClient) -> Arc<Self> {
        let handlers: Arc<DashMap<String, ChangeHandler>> = Arc::new(DashMap::new());
        let (events, receiver) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        Self::spawn_dispatcher(handlers.clone(), receiver, cancel_token.clone());

        Arc::new(Self {
            entries: DashMap::new(),
            tombstones: DashMap::new(),
            handlers,
            events,
            outbound: DashMap::new(),
            last_version: AtomicU64::new(0),
            membership,
            peers,
            cancel_token,
        })
    }

    fn spawn_dispatcher(
        handlers: Arc<DashMap<String, ChangeHandler>>,
        mut receiver: mpsc::UnboundedReceiver<ClusterProcess>,
        cancel_token: CancellationToken,
    ) {
        tokio::spawn(async move {
            loop {
                let process = tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    process = receiver.recv() => match process {
                        Some(process) => process,
                        None => break,
                    },
                };

                // Snapshot so a handler may (de)register handlers without deadlocking.
                let snapshot: Vec<ChangeHandler> =
                    handlers.iter().map(|entry| entry.value().clone()).collect();

                tracing::debug!(
                    "Dispatching operational change of {} on {:?} to {} handler(s)",
                    process.kind(),
                    process.owner(),
                    snapshot.len()
                );

                for handler in snapshot {
                    handler(&process);
                }
            }
            tracing::debug!("Status dispatcher shutting down");
        });
    }

    /// Fire-and-forget write: applied locally, then pushed to every alive peer.
    pub fn put(&self, process: ClusterProcess, operational: bool) {
        let record = StatusRecord {
            process,
            operational,
            version: self.next_version(),
        };

        self.apply(record.clone());
        self.replicate(vec![record]);
    }

    pub fn get(&self, process: &ClusterProcess) -> Option<bool> {
        self.entries.get(process).map(|entry| entry.operational)
    }

    pub fn entries(&self) -> Vec<(ClusterProcess, bool)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().operational))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry matching `predicate` here and on all alive peers.
    ///
    /// Removals travel on the same per-peer queues as writes, so a peer never
    /// sees an earlier write after the removal. Removals never notify handlers.
    /// Peer failures are logged, not returned.
    pub async fn remove_all<P>(&self, predicate: P) -> usize
    where
        P: Fn(&ClusterProcess) -> bool,
    {
        let doomed: Vec<Tombstone> = self
            .entries
            .iter()
            .filter(|entry| predicate(entry.key()))
            .map(|entry| Tombstone {
                process: entry.key().clone(),
                version: entry.value().version,
            })
            .collect();

        self.apply_removals(&doomed);

        if doomed.is_empty() {
            return 0;
        }

        let mut acks = Vec::new();
        for peer in self.membership.get_alive_peers() {
            let (done, ack) = oneshot::channel();
            let queued = self.outbound(&peer).send(Outbound::Removals {
                tombstones: doomed.clone(),
                done,
            });
            if queued.is_ok() {
                acks.push((peer.id, ack));
            }
        }

        for (peer, ack) in acks {
            match tokio::time::timeout(REMOVAL_ACK_TIMEOUT, ack).await {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) | Ok(Err(_)) => {
                    tracing::warn!("Failed to push removals to {:?}", peer);
                }
                Err(_) => tracing::warn!("Timed out pushing removals to {:?}", peer),
            }
        }

        tracing::info!("Removed {} entries from {}", doomed.len(), OPERATIONAL_PROCESSES);
        doomed.len()
    }

    /// Registers a change handler and returns its id.
    pub fn on_change<F>(&self, handler: F) -> String
    where
        F: Fn(&ClusterProcess) + Send + Sync + 'static,
    {
        let id = uuid::Uuid::new_v4().to_string();
        self.handlers.insert(id.clone(), Arc::new(handler));
        tracing::debug!("Registered change handler {}", id);
        id
    }

    pub fn remove_handler(&self, id: &str) -> bool {
        self.handlers.remove(id).is_some()
    }

    /// Applies a record if it is newer than what this replica holds.
    ///
    /// Returns `true` when the replica changed.
    pub fn apply(&self, record: StatusRecord) -> bool {
        let StatusRecord {
            process,
            operational,
            version,
        } = record;

        let incoming = StatusEntry {
            operational,
            version,
        };

        // The entry guard is held while the tombstone is consulted, so a
        // concurrent removal of the same key cannot interleave.
        let applied = match self.entries.entry(process.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().version >= version {
                    tracing::trace!("Ignoring stale write v{} for {:?}", version, process);
                    false
                } else {
                    existing.insert(incoming);
                    true
                }
            }
            Entry::Vacant(slot) => {
                let buried = self
                    .tombstones
                    .get(&process)
                    .is_some_and(|removed_at| *removed_at >= version);
                if buried {
                    tracing::trace!("Ignoring removed write v{} for {:?}", version, process);
                    false
                } else {
                    self.tombstones.remove(&process);
                    slot.insert(incoming);
                    true
                }
            }
        };

        if applied && operational && self.events.send(process).is_err() {
            tracing::debug!("Status dispatcher stopped, change not delivered");
        }

        applied
    }

    /// Applies a batch of records, returning how many changed this replica.
    pub fn merge(&self, records: Vec<StatusRecord>) -> usize {
        records
            .into_iter()
            .filter(|record| self.apply(record.clone()))
            .count()
    }

    /// Applies removals, returning how many entries were dropped.
    ///
    /// An entry written after the removed version survives. Every tombstone is
    /// kept, whether or not this replica held the entry.
    pub fn apply_removals(&self, tombstones: &[Tombstone]) -> usize {
        tombstones
            .iter()
            .filter(|tombstone| self.apply_removal(tombstone))
            .count()
    }

    fn apply_removal(&self, tombstone: &Tombstone) -> bool {
        let Tombstone { process, version } = tombstone;

        match self.entries.entry(process.clone()) {
            Entry::Occupied(existing) if existing.get().version > *version => {
                tracing::trace!("Keeping {:?}, written after removal v{}", process, version);
                false
            }
            Entry::Occupied(existing) => {
                // Buried before the guard is released.
                self.bury(process, *version);
                existing.remove();
                true
            }
            Entry::Vacant(_) => {
                self.bury(process, *version);
                false
            }
        }
    }

    fn bury(&self, process: &ClusterProcess, version: u64) {
        self.tombstones
            .entry(process.clone())
            .and_modify(|removed_at| *removed_at = (*removed_at).max(version))
            .or_insert(version);
    }

    pub fn dump(&self) -> Vec<StatusRecord> {
        self.entries
            .iter()
            .map(|entry| StatusRecord {
                process: entry.key().clone(),
                operational: entry.value().operational,
                version: entry.value().version,
            })
            .collect()
    }

    pub fn dump_tombstones(&self) -> Vec<Tombstone> {
        self.tombstones
            .iter()
            .map(|entry| Tombstone {
                process: entry.key().clone(),
                version: *entry.value(),
            })
            .collect()
    }

    /// Pulls the full table from `node` and merges it.
    pub async fn sync_from(&self, node: &Node) -> ClusterResult<usize> {
        let dump: StatusDumpResponse = self.peers.get(node, ENDPOINT_STATUS_DUMP).await?;
        self.apply_removals(&dump.tombstones);
        let applied = self.merge(dump.records);

        if applied > 0 {
            tracing::info!("Anti-entropy: merged {} entries from {:?}", applied, node.id);
        }
        Ok(applied)
    }

    /// Pushes the full local table, tombstones included, to `node`.
    pub async fn push_to(&self, node: &Node) -> ClusterResult<usize> {
        let request = ReplicateStatusRequest {
            records: self.dump(),
            tombstones: self.dump_tombstones(),
        };
        if request.records.is_empty() && request.tombstones.is_empty() {
            return Ok(0);
        }

        let response: ReplicateStatusResponse = self
            .peers
            .post(node, ENDPOINT_STATUS_REPLICATE, &request)
            .await?;
        Ok(response.applied)
    }

    /// Stops the dispatcher. Pending events are dropped.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Drops the replication queue of a departed peer.
    pub fn forget_peer(&self, node_id: &NodeId) {
        if self.outbound.remove(node_id).is_some() {
            tracing::debug!("Dropped replication queue for {:?}", node_id);
        }
    }

    fn replicate(&self, records: Vec<StatusRecord>) {
        for peer in self.membership.get_alive_peers() {
            if self
                .outbound(&peer)
                .send(Outbound::Records(records.clone()))
                .is_err()
            {
                tracing::debug!("Replication queue for {:?} is closed", peer.id);
            }
        }
    }

    fn outbound(&self, peer: &Node) -> mpsc::UnboundedSender<Outbound> {
        self.outbound
            .entry(peer.id.clone())
            .or_insert_with(|| self.spawn_replicator(peer.clone()))
            .value()
            .clone()
    }

    /// One worker per peer delivers that peer's writes in order.
    fn spawn_replicator(&self, peer: Node) -> mpsc::UnboundedSender<Outbound> {
        let (sender, mut queue) = mpsc::unbounded_channel();
        let client = self.peers.clone();
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    item = queue.recv() => match item {
                        Some(item) => item,
                        None => break,
                    },
                };

                match item {
                    Outbound::Records(records) => {
                        let request = ReplicateStatusRequest {
                            records,
                            tombstones: Vec::new(),
                        };
                        let result: ClusterResult<ReplicateStatusResponse> = client
                            .post(&peer, ENDPOINT_STATUS_REPLICATE, &request)
                            .await;
                        match result {
                            Ok(_) => tracing::trace!("Replicated status to {:?}", peer.id),
                            Err(e) => {
                                tracing::warn!("Failed to replicate status to {:?}: {}", peer.id, e)
                            }
                        }
                    }
                    Outbound::Removals { tombstones, done } => {
                        let request = RemoveStatusRequest { tombstones };
                        let result: ClusterResult<ReplicateStatusResponse> = client
                            .post(&peer, ENDPOINT_STATUS_REMOVE, &request)
                            .await;
                        if let Err(e) = &result {
                            tracing::debug!("Removal push to {:?} failed: {}", peer.id, e);
                        }
                        // The caller may have given up waiting.
                        let _ = done.send(result.is_ok());
                    }
                }
            }
            tracing::debug!("Replication worker for {:?} stopped", peer.id);
        });

        sender
    }

    /// Versions are microsecond timestamps, bumped to stay strictly increasing,
    /// so the latest write wins even across writers.
    fn next_version(&self) -> u64 {
        let now = now_micros();
        let mut current = self.last_version.load(Ordering::SeqCst);
        loop {
            let next = now.max(current + 1);
            match self.last_version.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}
