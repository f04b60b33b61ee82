//! Internal RPC
//!
//! Node-to-node HTTP API on `gossip port + 1000`: status replication,
//! leader slots and role locks. Not meant to be exposed to clients.

pub mod client;

use crate::election::elector::LeaderElector;
use crate::election::handlers::{
    handle_leader_dump, handle_leader_get, handle_leader_replicate, handle_leader_set,
    handle_lock_acquire, handle_lock_release,
};
use crate::election::protocol::{
    ENDPOINT_LEADER_DUMP, ENDPOINT_LEADER_GET, ENDPOINT_LEADER_REPLICATE, ENDPOINT_LEADER_SET,
    ENDPOINT_LOCK_ACQUIRE, ENDPOINT_LOCK_RELEASE,
};
use crate::storage::handlers::{handle_remove_status, handle_replicate_status, handle_status_dump};
use crate::storage::protocol::{
    ENDPOINT_STATUS_DUMP, ENDPOINT_STATUS_REMOVE, ENDPOINT_STATUS_REPLICATE,
};
use crate::storage::status::ProcessStatusTable;

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub fn router(statuses: Arc<ProcessStatusTable>, elector: Arc<LeaderElector>) -> Router {
    Router::new()
        .route(ENDPOINT_STATUS_REPLICATE, post(handle_replicate_status))
        .route(ENDPOINT_STATUS_REMOVE, post(handle_remove_status))
        .route(ENDPOINT_STATUS_DUMP, get(handle_status_dump))
        .route(ENDPOINT_LEADER_GET, post(handle_leader_get))
        .route(ENDPOINT_LEADER_SET, post(handle_leader_set))
        .route(ENDPOINT_LEADER_REPLICATE, post(handle_leader_replicate))
        .route(ENDPOINT_LEADER_DUMP, get(handle_leader_dump))
        .route(ENDPOINT_LOCK_ACQUIRE, post(handle_lock_acquire))
        .route(ENDPOINT_LOCK_RELEASE, post(handle_lock_release))
        .layer(Extension(statuses))
        .layer(Extension(elector))
}

/// Serves `router` until `cancel` fires.
pub fn serve(listener: TcpListener, router: Router, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let addr = listener.local_addr().ok();
        tracing::info!("Internal RPC listening on {:?}", addr);

        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
        {
            tracing::error!("Internal RPC server failed: {}", e);
        }

        tracing::debug!("Internal RPC server on {:?} stopped", addr);
    })
}
