use axum::{Json, extract::Extension, http::StatusCode};
use std::sync::Arc;

use super::elector::LeaderElector;
use super::protocol::{
    LeaderDumpResponse, LeaderQuery, LeaderSlotRecord, LeaderSlotResponse, LockRequest,
    LockResponse, ReplicateLeadersRequest, ReplicateLeadersResponse,
};

pub async fn handle_leader_get(
    Extension(elector): Extension<Arc<LeaderElector>>,
    Json(req): Json<LeaderQuery>,
) -> (StatusCode, Json<LeaderSlotResponse>) {
    (
        StatusCode::OK,
        Json(LeaderSlotResponse {
            holder: elector.leader(&req.role),
        }),
    )
}

pub async fn handle_leader_set(
    Extension(elector): Extension<Arc<LeaderElector>>,
    Json(req): Json<LeaderSlotRecord>,
) -> (StatusCode, Json<LeaderSlotResponse>) {
    let winner = elector.claim(&req.role, &req.holder);

    (
        StatusCode::OK,
        Json(LeaderSlotResponse {
            holder: Some(winner),
        }),
    )
}

pub async fn handle_leader_replicate(
    Extension(elector): Extension<Arc<LeaderElector>>,
    Json(req): Json<ReplicateLeadersRequest>,
) -> (StatusCode, Json<ReplicateLeadersResponse>) {
    let applied = elector.apply_slots(req.slots);
    (StatusCode::OK, Json(ReplicateLeadersResponse { applied }))
}

pub async fn handle_leader_dump(
    Extension(elector): Extension<Arc<LeaderElector>>,
) -> (StatusCode, Json<LeaderDumpResponse>) {
    (
        StatusCode::OK,
        Json(LeaderDumpResponse {
            slots: elector.dump_slots(),
        }),
    )
}

/// Blocks until the lock is granted. No timeout.
pub async fn handle_lock_acquire(
    Extension(elector): Extension<Arc<LeaderElector>>,
    Json(req): Json<LockRequest>,
) -> (StatusCode, Json<LockResponse>) {
    elector.acquire_lock(&req.name, &req.holder).await;
    (StatusCode::OK, Json(LockResponse { success: true }))
}

pub async fn handle_lock_release(
    Extension(elector): Extension<Arc<LeaderElector>>,
    Json(req): Json<LockRequest>,
) -> (StatusCode, Json<LockResponse>) {
    let success = elector.release_lock(&req.name, &req.holder);
    (StatusCode::OK, Json(LockResponse { success }))
}
