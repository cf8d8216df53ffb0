//! `/analysis/*` handlers (§4.2 steps 1-8, 6's request-processor contract).

use axum::Json;
use axum::extract::{Path, State};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AceResult;
use crate::http::state::AppState;
use crate::http::wire::{PostResultRequest, RootResponse, SubmitRootRequest, check_schema_version};

/// Submit a fresh root for analysis.
#[utoipa::path(
    post,
    path = "/analysis/root",
    request_body = SubmitRootRequest,
    responses((status = 200, description = "Root accepted", body = RootResponse)),
    tag = "Analysis",
    security(("bearer_auth" = []))
)]
pub async fn submit_root(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitRootRequest>,
) -> AceResult<Json<RootResponse>> {
    check_schema_version(body.schema_version)?;
    let uuid = state.core.submit_root(body.root).await?;
    let root = state.core.get_root(uuid).await?;
    Ok(Json(root.into()))
}

/// Fetch the current state of a tracked root.
#[utoipa::path(
    get,
    path = "/analysis/root/{uuid}",
    params(("uuid" = Uuid, Path, description = "Root uuid")),
    responses((status = 200, description = "Root found", body = RootResponse)),
    tag = "Analysis",
    security(("bearer_auth" = []))
)]
pub async fn get_root(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<Uuid>,
) -> AceResult<Json<RootResponse>> {
    let root = state.core.get_root(uuid).await?;
    Ok(Json(root.into()))
}

/// Post a completed observable-analysis result back into the tree.
#[utoipa::path(
    post,
    path = "/analysis/result",
    request_body = PostResultRequest,
    responses((status = 200, description = "Result merged", body = RootResponse)),
    tag = "Analysis",
    security(("bearer_auth" = []))
)]
pub async fn post_result(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PostResultRequest>,
) -> AceResult<Json<RootResponse>> {
    check_schema_version(body.schema_version)?;
    let root_uuid = body.result.root_uuid;
    state.core.post_result(body.result).await?;
    let root = state.core.get_root(root_uuid).await?;
    Ok(Json(root.into()))
}
