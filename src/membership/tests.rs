//! Membership Module Tests
//!
//! Validates the fundamental components of the cluster membership system.
//!
//! ## Test Scopes
//! - **Data Structures**: Unique IDs and serialization of wire protocol messages.
//! - **Join**: Seed handshake, founding a cluster, and bounded failure against dead seeds.
//! - **Isolation**: Groups with different names never merge.
//! - **Leave**: Idempotent departure and peer notification.

#[cfg(test)]
mod tests {
    use crate::error::ClusterError;
    use crate::membership::service::MembershipService;
    use crate::membership::types::{
        Envelope, GossipMessage, MembershipEvent, Node, NodeId, NodeState,
    };
    use crate::testing::{loopback, next_port, wait_until};
    use std::time::{Duration, Instant};

    // ============================================================
    // NODE ID TESTS
    // ============================================================

    #[test]
    fn test_node_id_is_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();

        assert_ne!(id1, id2, "Each NodeId should be unique");
    }

    #[test]
    fn test_node_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(NodeId("node-1".to_string()));
        set.insert(NodeId("node-1".to_string())); // duplicate
        set.insert(NodeId("node-2".to_string()));

        assert_eq!(set.len(), 2, "HashSet should have 2 unique NodeIds");
    }

    // ============================================================
    // WIRE FORMAT TESTS
    // ============================================================

    #[test]
    fn test_node_serialization_skips_last_seen() {
        let node = Node {
            id: NodeId("test-node".to_string()),
            name: Some("host-a".to_string()),
            gossip_addr: "192.168.1.1:5000".parse().unwrap(),
            rpc_addr: "192.168.1.1:6000".parse().unwrap(),
            state: NodeState::Alive,
            incarnation: 42,
            started_at: 1_700_000_000_000_000,
            last_seen: Some(Instant::now()),
        };

        let encoded = bincode::serialize(&node).expect("Bincode serialization failed");
        let restored: Node =
            bincode::deserialize(&encoded).expect("Bincode deserialization failed");

        assert_eq!(restored.id, node.id);
        assert_eq!(restored.name.as_deref(), Some("host-a"));
        assert_eq!(restored.rpc_addr, node.rpc_addr);
        assert_eq!(restored.incarnation, 42);
        assert_eq!(restored.started_at, node.started_at);
        // last_seen is skipped in serde, should be None
        assert!(restored.last_seen.is_none());
    }

    #[test]
    fn test_envelope_carries_cluster_name() {
        let envelope = Envelope {
            cluster: "payments".to_string(),
            message: GossipMessage::Leave {
                node_id: NodeId("leaving".to_string()),
            },
        };

        let encoded = bincode::serialize(&envelope).unwrap();
        let decoded: Envelope = bincode::deserialize(&encoded).unwrap();

        assert_eq!(decoded.cluster, "payments");
        if let GossipMessage::Leave { node_id } = decoded.message {
            assert_eq!(node_id.0, "leaving");
        } else {
            panic!("Wrong message type");
        }
    }

    // ============================================================
    // JOIN TESTS
    // ============================================================

    #[tokio::test]
    async fn test_founder_needs_no_seed() {
        let port = next_port();
        let service = MembershipService::bind("founders", loopback(port))
            .await
            .unwrap();

        // A seed pointing at ourselves is ignored.
        service.join(&[loopback(port)]).await.unwrap();

        assert_eq!(service.get_alive_members().len(), 1);
        assert_eq!(service.local_node.rpc_addr.port(), port + 1000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_nodes_join_via_seed() {
        let seed_port = next_port();
        let seed = MembershipService::bind("join-test", loopback(seed_port))
            .await
            .unwrap();
        seed.join(&[]).await.unwrap();
        seed.clone().start().await;

        let mut events = seed.subscribe();

        let joiner = MembershipService::bind("join-test", loopback(next_port()))
            .await
            .unwrap();
        joiner.join(&[loopback(seed_port)]).await.unwrap();
        joiner.clone().start().await;

        // The joiner learned the seed from the Ack.
        assert!(joiner.is_member(seed.local_identity()));

        // The seed recorded the joiner and announced it.
        assert!(seed.is_member(joiner.local_identity()));
        match tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
            Ok(Ok(MembershipEvent::Joined(node))) => assert_eq!(&node.id, joiner.local_identity()),
            other => panic!("expected a Joined event, got {:?}", other),
        }

        joiner.leave().await;
        seed.leave().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_oldest_member_ignores_unseen_newcomer() {
        let seed_port = next_port();
        let founder = MembershipService::bind("age-test", loopback(seed_port))
            .await
            .unwrap();
        founder.join(&[]).await.unwrap();
        founder.clone().start().await;

        let second = MembershipService::bind("age-test", loopback(next_port()))
            .await
            .unwrap();
        second.join(&[loopback(seed_port)]).await.unwrap();

        // Not started: the second node never hears about the third one.
        let third = MembershipService::bind("age-test", loopback(next_port()))
            .await
            .unwrap();
        third.join(&[loopback(seed_port)]).await.unwrap();

        assert!(!second.is_member(third.local_identity()));
        assert_eq!(third.get_alive_members().len(), 3);

        for view in [&founder, &second, &third] {
            let oldest = view.oldest_member().unwrap();
            assert_eq!(&oldest.id, founder.local_identity());
        }

        founder.leave().await;
        second.leave().await;
        third.leave().await;
    }

    #[tokio::test]
    async fn test_join_fails_when_seeds_unreachable() {
        let service = MembershipService::bind("lonely", loopback(next_port()))
            .await
            .unwrap();

        // Nobody listens on this port.
        let dead_seed = loopback(next_port());
        let result = service.join(&[dead_seed]).await;

        assert!(matches!(result, Err(ClusterError::Join { .. })));
        assert_eq!(service.members.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_different_cluster_names_never_merge() {
        let seed_port = next_port();
        let seed = MembershipService::bind("cluster-a", loopback(seed_port))
            .await
            .unwrap();
        seed.clone().start().await;

        let stranger = MembershipService::bind("cluster-b", loopback(next_port()))
            .await
            .unwrap();
        let result = stranger.join(&[loopback(seed_port)]).await;

        assert!(matches!(result, Err(ClusterError::Join { .. })));
        assert_eq!(seed.members.len(), 1);

        seed.leave().await;
    }

    // ============================================================
    // LEAVE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_leave_is_idempotent_without_join() {
        let service = MembershipService::bind("leave-test", loopback(next_port()))
            .await
            .unwrap();

        service.leave().await;
        service.leave().await;

        assert!(service.has_left());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_leave_marks_node_dead_on_peers() {
        let seed_port = next_port();
        let seed = MembershipService::bind("leave-peers", loopback(seed_port))
            .await
            .unwrap();
        seed.clone().start().await;

        let joiner = MembershipService::bind("leave-peers", loopback(next_port()))
            .await
            .unwrap();
        joiner.join(&[loopback(seed_port)]).await.unwrap();
        joiner.clone().start().await;

        let joiner_id = joiner.local_identity().clone();
        assert!(seed.is_member(&joiner_id));

        joiner.leave().await;

        let gone = wait_until(Duration::from_secs(2), || !seed.is_member(&joiner_id)).await;
        assert!(gone, "seed should drop a node that left");

        seed.leave().await;
    }
}
