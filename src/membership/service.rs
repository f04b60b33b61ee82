use super::types::{
    Envelope, GossipMessage, MembershipEvent, Node, NodeId, NodeState, RPC_PORT_OFFSET,
};
use crate::error::{ClusterError, ClusterResult};

use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::info;

const GOSSIP_INTERVAL: Duration = Duration::from_millis(500);
const FAILURE_DETECTION_INTERVAL: Duration = Duration::from_secs(2);
const SUSPECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Handshake attempts per seed member before it is given up on.
pub const JOIN_ATTEMPTS: usize = 10;
const JOIN_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(300);

const MAX_DATAGRAM: usize = 65536;
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct MembershipService {
    pub cluster_name: String,
    pub local_node: Node,
    pub members: Arc<DashMap<NodeId, Node>>,
    socket: Arc<UdpSocket>,
    incarnation: Arc<RwLock<u64>>,
    events: broadcast::Sender<MembershipEvent>,
    cancel_token: CancellationToken,
    left: AtomicBool,
}

impl MembershipService {
    /// Binds the gossip socket. The node knows only itself until [`join`](Self::join).
    pub async fn bind(cluster_name: &str, bind_addr: SocketAddr) -> ClusterResult<Arc<Self>> {
        let socket = UdpSocket::bind(bind_addr).await?;
        let gossip_addr = socket.local_addr()?;
        let rpc_port = gossip_addr
            .port()
            .checked_add(RPC_PORT_OFFSET)
            .ok_or_else(|| {
                ClusterError::Config(format!(
                    "Port {} leaves no room for the RPC port",
                    gossip_addr.port()
                ))
            })?;

        let incarnation_counter = Arc::new(RwLock::new(1));
        let current_inc = *incarnation_counter.read().await;
        let local_node = Node {
            id: NodeId::new(),
            name: local_hostname(),
            gossip_addr,
            rpc_addr: SocketAddr::new(gossip_addr.ip(), rpc_port),
            state: NodeState::Alive,
            incarnation: current_inc,
            started_at: now_micros(),
            last_seen: Some(Instant::now()),
        };

        let members = Arc::new(DashMap::new());
        members.insert(local_node.id.clone(), local_node.clone());

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            "Bound membership transport for cluster '{}' on {} (node {})",
            cluster_name, gossip_addr, local_node.id
        );

        Ok(Arc::new(Self {
            cluster_name: cluster_name.to_string(),
            local_node,
            members,
            socket: Arc::new(socket),
            incarnation: incarnation_counter,
            events,
            cancel_token: CancellationToken::new(),
            left: AtomicBool::new(false),
        }))
    }

    /// Joins the cluster through the static seed list.
    ///
    /// Each seed gets up to [`JOIN_ATTEMPTS`] handshakes. Seeds pointing at this node
    /// are skipped; with no seed left the node founds the cluster on its own.
    pub async fn join(&self, seeds: &[SocketAddr]) -> ClusterResult<()> {
        let seeds: Vec<SocketAddr> = seeds
            .iter()
            .copied()
            .filter(|seed| *seed != self.local_node.gossip_addr)
            .collect();

        if seeds.is_empty() {
            info!("No seed members, founding cluster '{}'", self.cluster_name);
            return Ok(());
        }

        info!("Joining cluster via {} seed node(s)", seeds.len());

        let request = self.encode(GossipMessage::Join {
            node: self.local_node.clone(),
        })?;

        let mut answered = 0;
        for seed in &seeds {
            if self.handshake(*seed, &request).await {
                answered += 1;
            }
        }

        if answered == 0 {
            return Err(ClusterError::Join {
                cluster: self.cluster_name.clone(),
                reason: format!(
                    "no answer from {} seed member(s) after {} attempts each",
                    seeds.len(),
                    JOIN_ATTEMPTS
                ),
            });
        }

        info!(
            "Joined cluster '{}' ({} members known)",
            self.cluster_name,
            self.members.len()
        );
        Ok(())
    }

    async fn handshake(&self, seed: SocketAddr, request: &[u8]) -> bool {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        for attempt in 1..=JOIN_ATTEMPTS {
            let deadline = tokio::time::Instant::now() + JOIN_ATTEMPT_TIMEOUT;

            if let Err(e) = self.socket.send_to(request, seed).await {
                tracing::debug!("Join request to {} failed (attempt {}): {}", seed, attempt, e);
                tokio::time::sleep_until(deadline).await;
                continue;
            }

            loop {
                let received =
                    tokio::time::timeout_at(deadline, self.socket.recv_from(&mut buf)).await;

                match received {
                    Err(_) => break,
                    Ok(Err(e)) => {
                        tracing::debug!("Receive during join failed: {}", e);
                        tokio::time::sleep_until(deadline).await;
                        break;
                    }
                    Ok(Ok((len, src))) => match self.decode(&buf[..len], src) {
                        Some(GossipMessage::Ack {
                            from,
                            incarnation,
                            members,
                        }) if src == seed => {
                            self.handle_ack(from, incarnation, members).await;
                            info!("Seed {} accepted join (attempt {})", seed, attempt);
                            return true;
                        }
                        Some(other) => {
                            if let Err(e) = self.handle_message(other, src).await {
                                tracing::warn!("Error handling message from {}: {}", src, e);
                            }
                        }
                        None => {}
                    },
                }
            }

            tracing::debug!("No answer from seed {} (attempt {})", seed, attempt);
        }

        tracing::warn!(
            "Seed member {} did not answer after {} attempts",
            seed,
            JOIN_ATTEMPTS
        );
        false
    }

    pub async fn start(self: Arc<Self>) {
        tracing::info!("Starting membership service...");

        {
            let service = self.clone();
            tokio::spawn(async move {
                service.gossip_loop().await;
            });
        }

        {
            let service = self.clone();
            tokio::spawn(async move {
                service.receive_loop().await;
            });
        }

        {
            let service = self.clone();
            tokio::spawn(async move {
                service.failure_detection_loop().await;
            });
        }

        tracing::info!("All background tasks started");
    }

    /// Announces departure and stops the background tasks.
    ///
    /// Safe to call any number of times, including on a node that never joined.
    pub async fn leave(&self) {
        if self.left.swap(true, Ordering::SeqCst) {
            return;
        }

        self.broadcast_message(GossipMessage::Leave {
            node_id: self.local_node.id.clone(),
        })
        .await;

        self.cancel_token.cancel();
        info!(
            "Node {} left cluster '{}'",
            self.local_node.id, self.cluster_name
        );
    }

    /// Stops the background tasks without announcing departure.
    /// Peers find out through failure detection.
    pub fn abort(&self) {
        self.left.store(true, Ordering::SeqCst);
        self.cancel_token.cancel();
    }

    #[cfg(test)]
    pub(crate) fn has_left(&self) -> bool {
        self.left.load(Ordering::SeqCst)
    }

    pub fn local_identity(&self) -> &NodeId {
        &self.local_node.id
    }

    pub fn is_member(&self, node_id: &NodeId) -> bool {
        self.members
            .get(node_id)
            .map(|member| member.state == NodeState::Alive)
            .unwrap_or(false)
    }

    pub fn get_member(&self, node_id: &NodeId) -> Option<Node> {
        self.members.get(node_id).map(|entry| entry.value().clone())
    }

    pub fn get_alive_members(&self) -> Vec<Node> {
        self.members
            .iter()
            .filter(|entry| entry.value().state == NodeState::Alive)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// The longest-running alive member, this node included.
    ///
    /// A joining node learns every existing member from its seed before it
    /// becomes active, and newcomers always rank last. A view that has not yet
    /// seen a newcomer therefore agrees with the views that have.
    pub fn oldest_member(&self) -> Option<Node> {
        self.get_alive_members()
            .into_iter()
            .min_by(|a, b| a.seniority().cmp(&b.seniority()))
    }

    /// Alive members other than this node.
    pub fn get_alive_peers(&self) -> Vec<Node> {
        self.get_alive_members()
            .into_iter()
            .filter(|node| node.id != self.local_node.id)
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: MembershipEvent) {
        // No subscriber is fine.
        let _ = self.events.send(event);
    }

    fn encode(&self, message: GossipMessage) -> ClusterResult<Vec<u8>> {
        let envelope = Envelope {
            cluster: self.cluster_name.clone(),
            message,
        };
        Ok(bincode::serialize(&envelope)?)
    }

    fn decode(&self, bytes: &[u8], src: SocketAddr) -> Option<GossipMessage> {
        match bincode::deserialize::<Envelope>(bytes) {
            Ok(envelope) if envelope.cluster == self.cluster_name => Some(envelope.message),
            Ok(envelope) => {
                tracing::debug!(
                    "Ignoring message for cluster '{}' from {}",
                    envelope.cluster,
                    src
                );
                None
            }
            Err(e) => {
                tracing::warn!("Failed to deserialize message from {}: {}", src, e);
                None
            }
        }
    }

    async fn gossip_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(GOSSIP_INTERVAL);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    tracing::debug!("Gossip loop shutting down");
                    break;
                }
                _ = interval.tick() => {}
            }

            let alive_members = self.get_alive_peers();

            if alive_members.is_empty() {
                continue;
            }

            use rand::Rng;
            let idx = rand::thread_rng().gen_range(0..alive_members.len());
            let target = &alive_members[idx];

            let incarnation = *self.incarnation.read().await;
            let msg = GossipMessage::Ping {
                from: self.local_node.id.clone(),
                incarnation,
                started_at: self.local_node.started_at,
            };

            match self.encode(msg) {
                Ok(encoded) => {
                    if let Err(e) = self.socket.send_to(&encoded, target.gossip_addr).await {
                        tracing::warn!("Failed to send ping to {:?}: {}", target.id, e);
                    } else {
                        tracing::trace!("Sent ping to {:?}", target.id);
                    }
                }
                Err(e) => tracing::error!("Failed to serialize ping: {}", e),
            }
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let received = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    tracing::debug!("Receive loop shutting down");
                    break;
                }
                received = self.socket.recv_from(&mut buf) => received,
            };

            match received {
                Ok((len, src)) => {
                    if let Some(msg) = self.decode(&buf[..len], src)
                        && let Err(e) = self.handle_message(msg, src).await
                    {
                        tracing::error!("Error handling message from {}: {}", src, e);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to receive UDP packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_message(&self, msg: GossipMessage, src: SocketAddr) -> ClusterResult<()> {
        match msg {
            GossipMessage::Ping {
                from,
                incarnation,
                started_at,
            } => {
                self.handle_ping(from, incarnation, started_at, src).await?;
            }

            GossipMessage::Ack {
                from,
                incarnation,
                members,
            } => {
                self.handle_ack(from, incarnation, members).await;
            }

            GossipMessage::Join { node } => {
                self.handle_join(node, src).await?;
            }

            GossipMessage::Suspect {
                node_id,
                incarnation,
            } => {
                self.handle_suspect(node_id, incarnation).await;
            }

            GossipMessage::Alive {
                node_id,
                incarnation,
            } => {
                self.handle_alive(node_id, incarnation);
            }

            GossipMessage::Leave { node_id } => {
                self.handle_leave(node_id);
            }
        }

        Ok(())
    }

    async fn handle_ping(
        &self,
        from: NodeId,
        from_incarnation: u64,
        started_at: u64,
        src: SocketAddr,
    ) -> ClusterResult<()> {
        tracing::trace!("Received ping from {:?}", from);

        let known = match self.members.get_mut(&from) {
            Some(mut member) => {
                member.last_seen = Some(Instant::now());
                if from_incarnation > member.incarnation {
                    member.incarnation = from_incarnation;
                }
                true
            }
            None => false,
        };

        if !known {
            tracing::info!("Discovered new member via ping: {:?} at {}", from, src);

            let new_node = Node {
                id: from.clone(),
                name: None,
                gossip_addr: src,
                rpc_addr: SocketAddr::new(src.ip(), src.port().saturating_add(RPC_PORT_OFFSET)),
                state: NodeState::Alive,
                incarnation: from_incarnation,
                started_at,
                last_seen: Some(Instant::now()),
            };

            self.members.insert(new_node.id.clone(), new_node.clone());
            self.publish(MembershipEvent::Joined(new_node));
        }

        self.send_ack(src).await?;

        tracing::trace!("Sent ack to {:?} with {} members", from, self.members.len());

        Ok(())
    }

    async fn send_ack(&self, target: SocketAddr) -> ClusterResult<()> {
        let all_members: Vec<Node> = self
            .members
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let my_incarnation = *self.incarnation.read().await;
        let reply = self.encode(GossipMessage::Ack {
            from: self.local_node.id.clone(),
            incarnation: my_incarnation,
            members: all_members,
        })?;

        self.socket.send_to(&reply, target).await?;
        Ok(())
    }

    async fn handle_ack(&self, from: NodeId, from_incarnation: u64, members: Vec<Node>) {
        tracing::trace!(
            "Received ack from {:?} (inc={}) with {} members",
            from,
            from_incarnation,
            members.len()
        );

        if let Some(mut member) = self.members.get_mut(&from) {
            member.last_seen = Some(Instant::now());
            if from_incarnation > member.incarnation {
                member.incarnation = from_incarnation;
            }
        }

        for member in members {
            self.merge_member(member);
        }
    }

    fn merge_member(&self, new_member: Node) {
        if new_member.id == self.local_node.id {
            return;
        }

        let event = match self.members.get_mut(&new_member.id) {
            Some(mut existing) => {
                if new_member.incarnation > existing.incarnation {
                    tracing::debug!(
                        "Updating {:?}: inc {} -> {}",
                        new_member.id,
                        existing.incarnation,
                        new_member.incarnation,
                    );

                    let was_dead = existing.state == NodeState::Dead;
                    existing.state = new_member.state.clone();
                    existing.incarnation = new_member.incarnation;
                    existing.last_seen = Some(Instant::now());

                    match existing.state {
                        NodeState::Alive if was_dead => {
                            Some(MembershipEvent::Joined(existing.value().clone()))
                        }
                        NodeState::Dead if !was_dead => {
                            Some(MembershipEvent::Left(existing.id.clone()))
                        }
                        _ => None,
                    }
                } else {
                    if new_member.incarnation == existing.incarnation
                        && new_member.state == NodeState::Alive
                        && existing.state == NodeState::Suspect
                    {
                        tracing::info!("{:?} refuted suspicion", new_member.id);
                        existing.state = NodeState::Alive;
                        existing.last_seen = Some(Instant::now());
                    }
                    None
                }
            }
            None => {
                if new_member.state == NodeState::Dead {
                    return;
                }

                tracing::info!(
                    "Discovered new member: {:?} at {}",
                    new_member.id,
                    new_member.gossip_addr
                );

                let mut member_with_timestamp = new_member;
                member_with_timestamp.last_seen = Some(Instant::now());

                self.members
                    .insert(member_with_timestamp.id.clone(), member_with_timestamp.clone());
                Some(MembershipEvent::Joined(member_with_timestamp))
            }
        };

        if let Some(event) = event {
            self.publish(event);
        }
    }

    async fn handle_suspect(&self, node_id: NodeId, incarnation: u64) {
        if node_id == self.local_node.id {
            let current = *self.incarnation.read().await;
            if incarnation < current {
                return;
            }

            let my_incarnation = {
                let mut inc = self.incarnation.write().await;
                *inc = (*inc).max(incarnation) + 1;
                *inc
            };

            if let Some(mut me) = self.members.get_mut(&node_id) {
                me.incarnation = my_incarnation;
                me.state = NodeState::Alive;
                me.last_seen = Some(Instant::now());
            }

            tracing::info!("Refuting suspicion with incarnation {}", my_incarnation);
            self.broadcast_message(GossipMessage::Alive {
                node_id,
                incarnation: my_incarnation,
            })
            .await;
            return;
        }

        match self.members.get_mut(&node_id) {
            Some(mut existing) => {
                if incarnation >= existing.incarnation && existing.state == NodeState::Alive {
                    tracing::info!(
                        "Node {:?} at {} suspected",
                        existing.id,
                        existing.gossip_addr
                    );
                    existing.state = NodeState::Suspect;
                    existing.incarnation = incarnation;
                }
            }
            None => {
                tracing::debug!("Suspected node {:?} doesn't exist", node_id);
            }
        }
    }

    fn handle_alive(&self, node_id: NodeId, incarnation: u64) {
        let revived = match self.members.get_mut(&node_id) {
            Some(mut existing) => {
                if incarnation > existing.incarnation
                    || (incarnation == existing.incarnation
                        && existing.state == NodeState::Suspect)
                {
                    tracing::info!(
                        "Node {:?} at {} is Alive (inc={})",
                        existing.id,
                        existing.gossip_addr,
                        incarnation
                    );
                    let was_dead = existing.state == NodeState::Dead;
                    existing.state = NodeState::Alive;
                    existing.incarnation = incarnation;
                    existing.last_seen = Some(Instant::now());
                    was_dead.then(|| existing.value().clone())
                } else {
                    None
                }
            }
            None => {
                tracing::debug!("Alive message for unknown node {:?}", node_id);
                None
            }
        };

        if let Some(node) = revived {
            self.publish(MembershipEvent::Joined(node));
        }
    }

    async fn handle_join(&self, mut node: Node, src: SocketAddr) -> ClusterResult<()> {
        tracing::info!("Node {:?} joining cluster at {}", node.id, node.gossip_addr);

        node.state = NodeState::Alive;
        node.last_seen = Some(Instant::now());

        self.members.insert(node.id.clone(), node.clone());
        self.publish(MembershipEvent::Joined(node));

        tracing::info!("Cluster size now: {}", self.members.len());

        self.send_ack(src).await
    }

    fn handle_leave(&self, node_id: NodeId) {
        if node_id == self.local_node.id {
            return;
        }

        let departed = match self.members.get_mut(&node_id) {
            Some(mut member) if member.state != NodeState::Dead => {
                member.state = NodeState::Dead;
                true
            }
            _ => false,
        };

        if departed {
            tracing::info!("Node {:?} left the cluster", node_id);
            self.publish(MembershipEvent::Left(node_id));
        }
    }

    async fn failure_detection_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(FAILURE_DETECTION_INTERVAL);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    tracing::debug!("Failure detection loop shutting down");
                    break;
                }
                _ = interval.tick() => {}
            }

            let now = Instant::now();

            let mut messages_to_broadcast = Vec::new();
            let mut declared_dead = Vec::new();

            for mut entry in self.members.iter_mut() {
                let member = entry.value_mut();

                if member.id == self.local_node.id {
                    continue;
                }

                let Some(last_seen) = member.last_seen else {
                    member.last_seen = Some(now);
                    continue;
                };

                let elapsed = now.duration_since(last_seen);

                match member.state {
                    NodeState::Alive => {
                        if elapsed > SUSPECT_TIMEOUT {
                            tracing::warn!(
                                "Node {:?} suspected (no contact for {:?})",
                                member.id,
                                elapsed
                            );

                            member.state = NodeState::Suspect;

                            messages_to_broadcast.push(GossipMessage::Suspect {
                                node_id: member.id.clone(),
                                incarnation: member.incarnation,
                            });
                        }
                    }

                    NodeState::Suspect => {
                        if elapsed > DEAD_TIMEOUT {
                            tracing::warn!(
                                "Node {:?} declared DEAD (no contact for {:?})",
                                member.id,
                                elapsed
                            );

                            member.state = NodeState::Dead;
                            declared_dead.push(member.id.clone());
                        }
                    }

                    NodeState::Dead => {
                        tracing::trace!("Node {:?} DEAD (no contact for {:?})", member.id, elapsed);
                    }
                }
            }

            if !declared_dead.is_empty() {
                tracing::info!(
                    "Cluster size now: {} alive nodes",
                    self.get_alive_members().len()
                );
            }

            for node_id in declared_dead {
                self.publish(MembershipEvent::Left(node_id));
            }

            for msg in messages_to_broadcast {
                self.broadcast_message(msg).await;
            }
        }
    }

    async fn broadcast_message(&self, msg: GossipMessage) {
        let encoded = match self.encode(msg) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!("Failed to serialize broadcast: {}", e);
                return;
            }
        };

        for member in self.get_alive_peers() {
            if let Err(e) = self.socket.send_to(&encoded, member.gossip_addr).await {
                tracing::warn!("Failed to broadcast to {:?}: {}", member.id, e);
            }
        }
    }
}

/// Picks the address the transport binds to.
///
/// An explicitly allowed interface wins. Otherwise the local address of the
/// route toward the first seed is used, and loopback when there is no seed or
/// no route. The wildcard address is never chosen implicitly.
pub fn resolve_bind_addr(interface: Option<IpAddr>, port: u16, seeds: &[SocketAddr]) -> SocketAddr {
    if let Some(ip) = interface {
        return SocketAddr::new(ip, port);
    }

    let routed = seeds.first().and_then(|seed| {
        let probe_bind: SocketAddr = if seed.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        // Connecting a UDP socket sends nothing, it only selects a route.
        let probe = std::net::UdpSocket::bind(probe_bind).ok()?;
        probe.connect(seed).ok()?;
        let local = probe.local_addr().ok()?;
        (!local.ip().is_unspecified()).then(|| local.ip())
    });

    SocketAddr::new(routed.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)), port)
}

/// Resolves `host:port` seed targets. Unresolvable entries are logged and skipped.
pub async fn resolve_seeds(targets: &[String]) -> Vec<SocketAddr> {
    let mut seeds = Vec::new();

    for target in targets {
        match tokio::net::lookup_host(target.as_str()).await {
            Ok(addrs) => {
                let mut addrs: Vec<SocketAddr> = addrs.collect();
                // Prefer IPv4, as hosts often resolve to both families.
                addrs.sort_by_key(|addr| !addr.is_ipv4());
                match addrs.first() {
                    Some(addr) => seeds.push(*addr),
                    None => tracing::warn!("Seed member {} resolved to no address", target),
                }
            }
            Err(e) => tracing::warn!("Failed to resolve seed member {}: {}", target, e),
        }
    }

    seeds
}

fn local_hostname() -> Option<String> {
    // An unnamed node is fine.
    hostname::get().ok().and_then(|name| name.into_string().ok())
}

/// Wall-clock microseconds since the Unix epoch.
pub(crate) fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_membership_creation() {
        let bind_addr = "127.0.0.1:0".parse().unwrap();

        let service = MembershipService::bind("test", bind_addr)
            .await
            .expect("Failed to create service");

        assert_eq!(service.members.len(), 1);

        let members = service.get_alive_members();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].state, NodeState::Alive);
        assert!(service.is_member(service.local_identity()));
    }

    #[test]
    fn test_explicit_interface_wins() {
        let addr = resolve_bind_addr(
            Some("127.0.0.1".parse().unwrap()),
            9003,
            &["10.1.2.3:9003".parse().unwrap()],
        );
        assert_eq!(addr, "127.0.0.1:9003".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_default_bind_is_never_wildcard() {
        let addr = resolve_bind_addr(None, 9003, &[]);
        assert_eq!(addr, "127.0.0.1:9003".parse::<SocketAddr>().unwrap());

        let addr = resolve_bind_addr(None, 9003, &["127.0.0.1:9010".parse().unwrap()]);
        assert!(!addr.ip().is_unspecified());
        assert_eq!(addr.port(), 9003);
    }

    #[tokio::test]
    async fn test_resolve_seeds_skips_unresolvable() {
        let seeds = resolve_seeds(&[
            "127.0.0.1:9010".to_string(),
            "no-such-host.invalid:9010".to_string(),
        ])
        .await;

        assert_eq!(seeds, vec!["127.0.0.1:9010".parse::<SocketAddr>().unwrap()]);
    }
}
