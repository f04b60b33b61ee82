//! Election Module Tests
//!
//! ## Test Scopes
//! - **LockTable**: Mutual exclusion, holder checks, release on departure.
//! - **LeaderSlots**: Write-once semantics and conflict handling.
//! - **LeaderElector**: Check-lock-check on a single node acting as its own authority.
//!
//! *Note: Elections across several live nodes are covered by the coordinator tests.*

#[cfg(test)]
mod tests {
    use crate::election::elector::{LeaderElector, WEB_LEADER_ROLE};
    use crate::election::lock::LockTable;
    use crate::election::protocol::LeaderSlotRecord;
    use crate::election::slots::LeaderSlots;
    use crate::membership::service::MembershipService;
    use crate::membership::types::NodeId;
    use crate::rpc::client::PeerClient;
    use std::sync::Arc;
    use std::time::Duration;

    fn node(id: &str) -> NodeId {
        NodeId(id.to_string())
    }

    async fn elector() -> (Arc<MembershipService>, Arc<LeaderElector>) {
        let membership = MembershipService::bind("election-test", "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let elector = LeaderElector::new(membership.clone(), PeerClient::new());
        (membership, elector)
    }

    // ============================================================
    // LOCK TABLE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_lock_is_mutually_exclusive() {
        let locks = Arc::new(LockTable::new());
        locks.acquire("web", &node("a")).await;
        assert_eq!(locks.holder("web"), Some(node("a")));

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("web", &node("b")).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!contender.is_finished(), "Second holder must wait");

        assert!(locks.release("web", &node("a")));
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("Contender should get the lock after release")
            .unwrap();
        assert_eq!(locks.holder("web"), Some(node("b")));
    }

    #[tokio::test]
    async fn test_only_holder_can_release() {
        let locks = LockTable::new();
        locks.acquire("web", &node("a")).await;

        assert!(!locks.release("web", &node("b")));
        assert_eq!(locks.holder("web"), Some(node("a")));
        assert!(locks.release("web", &node("a")));
        assert_eq!(locks.holder("web"), None);
    }

    #[tokio::test]
    async fn test_release_all_frees_departed_holder() {
        let locks = LockTable::new();
        locks.acquire("web", &node("a")).await;
        locks.acquire("batch", &node("a")).await;
        locks.acquire("other", &node("b")).await;

        assert_eq!(locks.release_all(&node("a")), 2);
        assert_eq!(locks.holder("web"), None);
        assert_eq!(locks.holder("other"), Some(node("b")));

        // Free again: does not block.
        tokio::time::timeout(Duration::from_millis(200), locks.acquire("web", &node("c")))
            .await
            .expect("Lock should be free");
    }

    // ============================================================
    // LEADER SLOT TESTS
    // ============================================================

    #[test]
    fn test_slot_is_write_once() {
        let slots = LeaderSlots::new();

        assert_eq!(slots.claim("web", &node("a")), node("a"));
        assert_eq!(slots.claim("web", &node("b")), node("a"));
        assert_eq!(slots.get("web"), Some(node("a")));
        assert_eq!(slots.get("batch"), None);
    }

    #[test]
    fn test_replicated_slot_never_overwrites() {
        let slots = LeaderSlots::new();

        assert!(slots.apply(LeaderSlotRecord {
            role: "web".to_string(),
            holder: node("a"),
        }));
        assert!(!slots.apply(LeaderSlotRecord {
            role: "web".to_string(),
            holder: node("b"),
        }));

        assert_eq!(slots.get("web"), Some(node("a")));
        assert_eq!(slots.dump().len(), 1);
    }

    // ============================================================
    // ELECTOR TESTS
    // ============================================================

    #[tokio::test]
    async fn test_single_node_is_its_own_authority() {
        let (membership, elector) = elector().await;

        let authority = elector.authority(WEB_LEADER_ROLE).unwrap();
        assert_eq!(&authority.id, membership.local_identity());
    }

    #[tokio::test]
    async fn test_first_acquire_wins_then_false() {
        let (membership, elector) = elector().await;

        assert!(elector.try_acquire(WEB_LEADER_ROLE).await.unwrap());
        assert_eq!(
            elector.leader(WEB_LEADER_ROLE).as_ref(),
            Some(membership.local_identity())
        );

        assert!(!elector.try_acquire(WEB_LEADER_ROLE).await.unwrap());
        assert!(!elector.try_acquire(WEB_LEADER_ROLE).await.unwrap());
    }

    #[tokio::test]
    async fn test_roles_are_independent() {
        let (_membership, elector) = elector().await;

        assert!(elector.try_acquire(WEB_LEADER_ROLE).await.unwrap());
        assert!(elector.try_acquire("compute").await.unwrap());
        assert_eq!(elector.dump_slots().len(), 2);
    }

    #[tokio::test]
    async fn test_winner_releases_lock() {
        let (_membership, elector) = elector().await;

        assert!(elector.try_acquire(WEB_LEADER_ROLE).await.unwrap());
        assert_eq!(elector.lock_holder(WEB_LEADER_ROLE), None);
    }

    #[tokio::test]
    async fn test_loser_behind_lock_releases_it() {
        let (_membership, elector) = elector().await;
        let rival = node("rival");

        // Hold the lock so the attempt gets past the slot checks and waits.
        elector.acquire_lock(WEB_LEADER_ROLE, &rival).await;
        let attempt = {
            let elector = elector.clone();
            tokio::spawn(async move { elector.try_acquire(WEB_LEADER_ROLE).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!attempt.is_finished(), "Attempt must wait for the lock");

        // The rival wins while holding the lock.
        elector.apply_slots(vec![LeaderSlotRecord {
            role: WEB_LEADER_ROLE.to_string(),
            holder: rival.clone(),
        }]);
        assert!(elector.release_lock(WEB_LEADER_ROLE, &rival));

        let won = tokio::time::timeout(Duration::from_secs(1), attempt)
            .await
            .expect("Attempt should finish once the lock is free")
            .unwrap()
            .unwrap();

        assert!(!won, "The slot was taken while waiting");
        assert_eq!(elector.leader(WEB_LEADER_ROLE), Some(rival));
        assert_eq!(elector.lock_holder(WEB_LEADER_ROLE), None);
    }

    #[tokio::test]
    async fn test_concurrent_local_acquires_have_one_winner() {
        let (_membership, elector) = elector().await;

        let mut attempts = Vec::new();
        for _ in 0..8 {
            let elector = elector.clone();
            attempts.push(tokio::spawn(async move {
                elector.try_acquire(WEB_LEADER_ROLE).await.unwrap()
            }));
        }

        let mut winners = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
