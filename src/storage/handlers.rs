use axum::{Json, extract::Extension, http::StatusCode};
use std::sync::Arc;

use super::protocol::{
    RemoveStatusRequest, ReplicateStatusRequest, ReplicateStatusResponse, StatusDumpResponse,
};
use super::status::ProcessStatusTable;

pub async fn handle_replicate_status(
    Extension(statuses): Extension<Arc<ProcessStatusTable>>,
    Json(req): Json<ReplicateStatusRequest>,
) -> (StatusCode, Json<ReplicateStatusResponse>) {
    let received = req.records.len();
    statuses.apply_removals(&req.tombstones);
    let applied = statuses.merge(req.records);

    tracing::debug!("Applied {}/{} replicated status records", applied, received);

    (StatusCode::OK, Json(ReplicateStatusResponse { applied }))
}

pub async fn handle_remove_status(
    Extension(statuses): Extension<Arc<ProcessStatusTable>>,
    Json(req): Json<RemoveStatusRequest>,
) -> (StatusCode, Json<ReplicateStatusResponse>) {
    let applied = statuses.apply_removals(&req.tombstones);

    tracing::debug!("Removed {} status records on peer request", applied);

    (StatusCode::OK, Json(ReplicateStatusResponse { applied }))
}

pub async fn handle_status_dump(
    Extension(statuses): Extension<Arc<ProcessStatusTable>>,
) -> (StatusCode, Json<StatusDumpResponse>) {
    (
        StatusCode::OK,
        Json(StatusDumpResponse {
            records: statuses.dump(),
            tombstones: statuses.dump_tombstones(),
        }),
    )
}
