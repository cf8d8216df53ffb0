//! `/blob*` handlers (§4.8: content-addressed blob store).

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use crate::error::AceResult;
use crate::http::state::AppState;
use crate::http::wire::BlobUploadResponse;
use crate::model::BlobHandle;

#[utoipa::path(
    post,
    path = "/blob",
    request_body(content = Vec<u8>, description = "Raw blob bytes"),
    responses((status = 200, description = "Stored, returns the sha256 handle", body = BlobUploadResponse)),
    tag = "Blobs",
    security(("bearer_auth" = []))
)]
pub async fn upload_blob(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AceResult<Json<BlobUploadResponse>> {
    let handle = state.core.store_blob(body.to_vec()).await?;
    Ok(Json(BlobUploadResponse { sha256: handle.0 }))
}

#[utoipa::path(
    get,
    path = "/blob/{sha256}",
    params(("sha256" = String, Path, description = "Blob handle")),
    responses((status = 200, description = "Blob bytes")),
    tag = "Blobs",
    security(("bearer_auth" = []))
)]
pub async fn download_blob(
    State(state): State<Arc<AppState>>,
    Path(sha256): Path<String>,
) -> AceResult<Response> {
    let handle = BlobHandle(sha256.clone());
    match state.core.load_blob(&handle).await? {
        Some(bytes) => Ok((StatusCode::OK, bytes).into_response()),
        None => Err(crate::error::AceError::not_found(format!("no blob {sha256}"))),
    }
}
