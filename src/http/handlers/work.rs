//! `/work/*` handlers (§4.4: per-module FIFO work queues).

use axum::Json;
use axum::extract::{Path, Query, State};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AceResult;
use crate::http::state::AppState;
use crate::http::wire::{GetWorkQuery, WorkResponse};
use crate::model::SCHEMA_VERSION;

/// Lease the next queued request for `amt_name`, or `null` if none is
/// visible right now.
#[utoipa::path(
    get,
    path = "/work/{amt_name}",
    params(
        ("amt_name" = String, Path, description = "Analysis module type name"),
        ("owner" = String, Query, description = "Lease owner identifier"),
        ("visibility_timeout_secs" = Option<u64>, Query, description = "Lease duration in seconds"),
    ),
    responses((status = 200, description = "Next request, if any", body = WorkResponse)),
    tag = "Work",
    security(("bearer_auth" = []))
)]
pub async fn get_next_request(
    State(state): State<Arc<AppState>>,
    Path(amt_name): Path<String>,
    Query(query): Query<GetWorkQuery>,
) -> AceResult<Json<WorkResponse>> {
    let amt = state
        .core
        .get_module(&amt_name)
        .await
        .ok_or_else(|| crate::error::AceError::not_found(format!("no module type {amt_name}")))?;

    let visibility_timeout = query.visibility_timeout_secs.map(Duration::from_secs);
    let request = state
        .core
        .get_next_analysis_request(&amt_name, amt.version, &query.owner, visibility_timeout)
        .await?;

    Ok(Json(WorkResponse { schema_version: SCHEMA_VERSION, request }))
}

/// Acks against `amt_version`, not whatever is currently registered — a
/// caller acks the version it actually leased, which may since have been
/// replaced (§4.3).
#[utoipa::path(
    post,
    path = "/work/{id}/ack",
    params(
        ("id" = Uuid, Path, description = "Request id"),
        ("amt_name" = String, Query, description = "Analysis module type name"),
        ("amt_version" = u32, Query, description = "Version the request was leased under"),
    ),
    responses((status = 204, description = "Acknowledged")),
    tag = "Work",
    security(("bearer_auth" = []))
)]
pub async fn ack_work(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<AckQuery>,
) -> AceResult<axum::http::StatusCode> {
    state.core.ack_work(&query.amt_name, query.amt_version, id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize, utoipa::ToSchema)]
pub struct AckQuery {
    pub amt_name: String,
    pub amt_version: u32,
}
