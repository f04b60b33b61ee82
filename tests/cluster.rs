//! End-to-end tests through the public API only.

use appstate_cluster::{
    AppStateCluster, ClusterError, ClusterSettings, CoordinatorState, ProcessKind,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Gossip ports for this test binary; RPC ports sit 1000 above.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(24000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

fn node_properties(cluster: &str, port: u16, seed: Option<u16>) -> HashMap<String, String> {
    let mut props = HashMap::from([
        ("cluster.enabled".to_string(), "true".to_string()),
        ("cluster.name".to_string(), cluster.to_string()),
        ("cluster.port".to_string(), port.to_string()),
        ("cluster.interfaces".to_string(), "127.0.0.1".to_string()),
    ]);
    if let Some(seed) = seed {
        props.insert("cluster.members".to_string(), format!("127.0.0.1:{}", seed));
    }
    props
}

async fn eventually<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(15), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_node_lifecycle() {
    let founder_port = next_port();
    let mut nodes = Vec::new();

    let founder_props = node_properties("it-lifecycle", founder_port, None);
    let founder = ClusterSettings::from_properties(&founder_props).unwrap();
    nodes.push(Arc::new(AppStateCluster::start(&founder).await.unwrap()));

    for _ in 0..2 {
        let settings = ClusterSettings::from_properties(&node_properties(
            "it-lifecycle",
            next_port(),
            Some(founder_port),
        ))
        .unwrap();
        nodes.push(Arc::new(AppStateCluster::start(&settings).await.unwrap()));
    }

    assert!(eventually(|| nodes.iter().all(|node| node.members().len() == 3)).await);
    assert!(nodes.iter().all(|node| node.state() == CoordinatorState::Active));

    // Every node listens; the last one reports a search backend.
    let seen: Vec<Arc<Mutex<Vec<ProcessKind>>>> = nodes
        .iter()
        .map(|node| {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            node.add_listener(move |kind| sink.lock().unwrap().push(kind));
            seen
        })
        .collect();

    nodes[2].set_operational(ProcessKind::Elasticsearch);

    assert!(
        eventually(|| seen
            .iter()
            .all(|seen| seen.lock().unwrap().as_slice() == [ProcessKind::Elasticsearch]))
        .await
    );
    assert!(nodes.iter().all(|node| node.is_operational(ProcessKind::Elasticsearch)));

    // One web leader, whoever asks first.
    let mut winners = 0;
    for node in &nodes {
        if node.try_to_lock_web_leader().await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    // Closing the reporting node withdraws its status everywhere else.
    nodes[2].close().await;
    assert!(eventually(|| !nodes[0].is_operational(ProcessKind::Elasticsearch)).await);
    assert!(eventually(|| nodes[1].members().len() == 2).await);

    for node in &nodes {
        node.close().await;
        assert_eq!(node.state(), CoordinatorState::Closed);
        assert!(matches!(node.reset(), Err(ClusterError::Unsupported(_))));
    }
}

#[tokio::test]
async fn test_disabled_by_default() {
    let settings = ClusterSettings::from_properties(&HashMap::new()).unwrap();
    assert!(!settings.enabled);

    let result = AppStateCluster::start(&settings).await;
    assert!(matches!(result, Err(ClusterError::Config(_))));
}
