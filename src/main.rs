use appstate_cluster::{AppStateCluster, ClusterSettings, ProcessKind};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        eprintln!(
            "Usage: {} [--port <port>] [--name <cluster>] [--interface <ip>] \
             [--seed <host[:port]>]... [--kind <app|es|web|ce>]",
            args[0]
        );
        eprintln!("Example: {} --port 9003", args[0]);
        eprintln!("Example: {} --port 9004 --seed 127.0.0.1:9003 --kind es", args[0]);
        eprintln!("Without flags, settings are read from CLUSTER_* environment variables.");
        std::process::exit(1);
    }

    // Flags override the environment; passing any flag enables clustering.
    let mut settings = ClusterSettings::from_env()?;
    let mut kind = ProcessKind::App;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match (args[i].as_str(), value) {
            ("--port", Some(value)) => {
                settings.port = value.parse()?;
                settings.enabled = true;
                i += 2;
            }
            ("--name", Some(value)) => {
                settings.name = value;
                settings.enabled = true;
                i += 2;
            }
            ("--interface", Some(value)) => {
                settings.interfaces.push(value);
                settings.enabled = true;
                i += 2;
            }
            ("--seed", Some(value)) => {
                settings.members.push(value);
                settings.enabled = true;
                i += 2;
            }
            ("--kind", Some(value)) => {
                kind = value.parse().map_err(anyhow::Error::msg)?;
                i += 2;
            }
            (flag, _) => {
                tracing::warn!("Ignoring argument {}", flag);
                i += 1;
            }
        }
    }

    if settings.members.is_empty() {
        tracing::info!("Starting as seed node (founder)");
    } else {
        tracing::info!("Seed members: {:?}", settings.members);
    }

    let cluster = AppStateCluster::start(&settings).await?;
    tracing::info!("Node ID: {}", cluster.local_identity());

    cluster.add_listener(|kind| {
        tracing::info!("Process kind '{}' is operational in the cluster", kind);
    });

    cluster.set_operational(kind);

    match cluster.try_to_lock_web_leader().await {
        Ok(true) => tracing::info!("This node is the web leader"),
        Ok(false) => tracing::info!("Web leader already elected: {:?}", cluster.leader("web")),
        Err(e) => tracing::warn!("Web leader election failed: {}", e),
    }

    tracing::info!("Press Ctrl+C to shutdown");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {
                let members = cluster.members();
                tracing::info!("Cluster stats: {} alive nodes", members.len());
                for node in members {
                    tracing::info!(
                        "  - {} ({}) gossip={} rpc={} (inc={})",
                        node.id,
                        node.name.as_deref().unwrap_or("unnamed"),
                        node.gossip_addr,
                        node.rpc_addr,
                        node.incarnation
                    );
                }
                for kind in ProcessKind::ALL {
                    tracing::debug!("  {} operational: {}", kind, cluster.is_operational(kind));
                }
            }
        }
    }

    tracing::info!("Shutting down");
    cluster.close().await;

    Ok(())
}
