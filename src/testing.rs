//! Helpers shared by the unit tests.

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

/// Atomic counter for allocating unique gossip ports (RPC ports sit 1000 above).
static PORT_COUNTER: AtomicU16 = AtomicU16::new(21000);

pub fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

pub fn loopback(port: u16) -> std::net::SocketAddr {
    std::net::SocketAddr::from(([127, 0, 0, 1], port))
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
