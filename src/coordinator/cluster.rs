//! Application-state coordinator for one node.
//!
//! Wires membership, the replicated status table, leader election and the
//! internal RPC server together, and owns their lifecycle.

use super::registry::ListenerRegistry;
use crate::config::ClusterSettings;
use crate::election::elector::{LeaderElector, WEB_LEADER_ROLE};
use crate::error::{ClusterError, ClusterResult};
use crate::membership::service::{MembershipService, resolve_bind_addr, resolve_seeds};
use crate::membership::types::{MembershipEvent, Node, NodeId};
use crate::rpc;
use crate::rpc::client::PeerClient;
use crate::storage::status::ProcessStatusTable;
use crate::storage::types::{ClusterProcess, ProcessKind};

use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const CLUSTER_DISABLED: &str = "Cluster is not enabled on this instance";
pub const RESET_UNSUPPORTED: &str = "state reset is not supported in cluster mode";

/// Period of the background full-table exchange with a random peer.
pub const ANTI_ENTROPY_INTERVAL: Duration = Duration::from_secs(5);
const SERVER_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Unconfigured,
    Joining,
    Active,
    Closed,
}

pub struct AppStateCluster {
    membership: Arc<MembershipService>,
    statuses: Arc<ProcessStatusTable>,
    elector: Arc<LeaderElector>,
    listeners: Arc<ListenerRegistry>,
    handler_id: String,
    state: Mutex<CoordinatorState>,
    cancel_token: CancellationToken,
    server: Mutex<Option<JoinHandle<()>>>,
}

impl AppStateCluster {
    /// Joins the configured cluster and returns an active coordinator.
    ///
    /// Fails with [`ClusterError::Config`] before touching the network when
    /// clustering is disabled or the settings are invalid, and with
    /// [`ClusterError::Join`] when no seed member answers.
    pub async fn start(settings: &ClusterSettings) -> ClusterResult<Self> {
        if !settings.enabled {
            return Err(ClusterError::Config(CLUSTER_DISABLED.to_string()));
        }
        settings.validate()?;

        let mut state = CoordinatorState::Unconfigured;
        tracing::debug!("Coordinator {:?}", state);

        let targets = settings.seed_targets()?;
        let seeds = resolve_seeds(&targets).await;
        if !targets.is_empty() && seeds.is_empty() {
            return Err(ClusterError::Join {
                cluster: settings.name.clone(),
                reason: "no seed member could be resolved".to_string(),
            });
        }

        let bind_addr = resolve_bind_addr(settings.bind_interface(), settings.port, &seeds);
        let membership = MembershipService::bind(&settings.name, bind_addr).await?;
        let membership_events = membership.subscribe();

        state = CoordinatorState::Joining;
        tracing::info!(
            "Coordinator {:?} cluster '{}' as {}",
            state,
            settings.name,
            membership.local_identity()
        );

        let peers = PeerClient::new();
        let statuses = ProcessStatusTable::new(membership.clone(), peers.clone());
        let elector = LeaderElector::new(membership.clone(), peers);
        let listeners = ListenerRegistry::new();
        let cancel_token = CancellationToken::new();

        let handler_id = {
            let listeners = listeners.clone();
            statuses.on_change(move |process| listeners.dispatch(process.kind()))
        };

        let listener = match TcpListener::bind(membership.local_node.rpc_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                statuses.shutdown();
                membership.abort();
                return Err(e.into());
            }
        };
        let server = rpc::serve(
            listener,
            rpc::router(statuses.clone(), elector.clone()),
            cancel_token.clone(),
        );

        if let Err(e) = membership.join(&seeds).await {
            tracing::error!("Join failed, tearing down: {}", e);
            cancel_token.cancel();
            statuses.shutdown();
            membership.abort();
            server.abort();
            return Err(e);
        }

        membership.clone().start().await;

        for peer in membership.get_alive_peers() {
            exchange(&statuses, &elector, &peer).await;
        }

        spawn_anti_entropy(
            membership.clone(),
            statuses.clone(),
            elector.clone(),
            membership_events,
            cancel_token.clone(),
        );

        state = CoordinatorState::Active;
        tracing::info!(
            "Coordinator {:?}: {} member(s) in cluster '{}'",
            state,
            membership.get_alive_members().len(),
            settings.name
        );

        Ok(Self {
            membership,
            statuses,
            elector,
            listeners,
            handler_id,
            state: Mutex::new(state),
            cancel_token,
            server: Mutex::new(Some(server)),
        })
    }

    /// Registers a callback run whenever some node reports `kind` operational.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(ProcessKind) + Send + Sync + 'static,
    {
        self.listeners.register(listener);
    }

    /// Whether any node currently reports `kind` operational.
    pub fn is_operational(&self, kind: ProcessKind) -> bool {
        self.statuses
            .entries()
            .into_iter()
            .any(|(process, operational)| operational && process.kind() == kind)
    }

    /// Marks `kind` operational on this node. Ignored once closed.
    pub fn set_operational(&self, kind: ProcessKind) {
        self.set_status(kind, true);
    }

    pub(crate) fn set_status(&self, kind: ProcessKind, operational: bool) {
        if self.state() == CoordinatorState::Closed {
            tracing::warn!("Ignoring status of '{}' on a closed coordinator", kind);
            return;
        }

        tracing::debug!("Setting '{}' operational={} on this node", kind, operational);
        self.statuses.put(
            ClusterProcess::new(self.local_identity().clone(), kind),
            operational,
        );
    }

    pub async fn try_to_lock_web_leader(&self) -> ClusterResult<bool> {
        self.try_acquire_leader(WEB_LEADER_ROLE).await
    }

    /// Tries to become the cluster-wide holder of `role`.
    pub async fn try_acquire_leader(&self, role: &str) -> ClusterResult<bool> {
        if self.state() == CoordinatorState::Closed {
            return Err(ClusterError::Unsupported(format!(
                "cannot elect '{}' leader on a closed coordinator",
                role
            )));
        }
        self.elector.try_acquire(role).await
    }

    /// Holder of `role` as known to this node.
    pub fn leader(&self, role: &str) -> Option<NodeId> {
        self.elector.leader(role)
    }

    pub fn reset(&self) -> ClusterResult<()> {
        Err(ClusterError::Unsupported(RESET_UNSUPPORTED.to_string()))
    }

    pub fn local_identity(&self) -> &NodeId {
        self.membership.local_identity()
    }

    pub fn members(&self) -> Vec<Node> {
        self.membership.get_alive_members()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.lock_state()
    }

    /// Purges this node's entries, leaves the cluster and stops every task.
    ///
    /// Never fails; later calls do nothing.
    pub async fn close(&self) {
        {
            let mut state = self.lock_state();
            if *state == CoordinatorState::Closed {
                return;
            }
            *state = CoordinatorState::Closed;
        }

        tracing::info!("Closing coordinator {}", self.local_identity());

        self.statuses.remove_handler(&self.handler_id);

        let me = self.local_identity().clone();
        let purged = self.statuses.remove_all(|process| process.owner() == &me).await;
        tracing::debug!("Purged {} local entries", purged);

        self.membership.leave().await;
        self.cancel_token.cancel();
        self.statuses.shutdown();

        let server = self
            .server
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(mut server) = server
            && tokio::time::timeout(SERVER_SHUTDOWN_GRACE, &mut server)
                .await
                .is_err()
        {
            tracing::warn!("Internal RPC server did not stop in time, aborting");
            server.abort();
        }

        tracing::info!("Coordinator {:?}", CoordinatorState::Closed);
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for AppStateCluster {
    fn drop(&mut self) {
        if self.state() == CoordinatorState::Closed {
            return;
        }

        tracing::warn!(
            "Coordinator {} dropped without close(), peers keep its entries",
            self.local_identity()
        );
        self.cancel_token.cancel();
        self.statuses.shutdown();
        self.membership.abort();
        if let Some(server) = self
            .server
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            server.abort();
        }
    }
}

/// Two-way full exchange of status entries and leader slots with `peer`.
async fn exchange(statuses: &ProcessStatusTable, elector: &LeaderElector, peer: &Node) {
    if let Err(e) = statuses.sync_from(peer).await {
        tracing::debug!("Status pull from {:?} failed: {}", peer.id, e);
    }
    if let Err(e) = statuses.push_to(peer).await {
        tracing::debug!("Status push to {:?} failed: {}", peer.id, e);
    }
    if let Err(e) = elector.sync_from(peer).await {
        tracing::debug!("Leader slot pull from {:?} failed: {}", peer.id, e);
    }
    if let Err(e) = elector.push_to(peer).await {
        tracing::debug!("Leader slot push to {:?} failed: {}", peer.id, e);
    }
}

fn spawn_anti_entropy(
    membership: Arc<MembershipService>,
    statuses: Arc<ProcessStatusTable>,
    elector: Arc<LeaderElector>,
    mut events: broadcast::Receiver<MembershipEvent>,
    cancel_token: CancellationToken,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ANTI_ENTROPY_INTERVAL);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,

                event = events.recv() => match event {
                    Ok(MembershipEvent::Joined(node)) => {
                        tracing::info!("Member {:?} joined, exchanging state", node.id);
                        exchange(&statuses, &elector, &node).await;
                    }
                    Ok(MembershipEvent::Left(node_id)) => {
                        tracing::info!("Member {:?} left", node_id);
                        statuses.forget_peer(&node_id);
                        elector.member_departed(&node_id);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {} membership events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },

                _ = interval.tick() => {
                    let peer = membership
                        .get_alive_peers()
                        .choose(&mut rand::thread_rng())
                        .cloned();
                    if let Some(peer) = peer {
                        exchange(&statuses, &elector, &peer).await;
                    }
                }
            }
        }

        tracing::debug!("Anti-entropy task stopped");
    });
}
