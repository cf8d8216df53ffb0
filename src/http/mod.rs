//! The `aced` HTTP facade (`SPEC_FULL.md` §4): the wire-format adapter on
//! top of `RemoteFacade`/`AceCore`. Thin handlers — extract, call, map
//! `AceResult` into JSON — exactly as the teacher's handlers call into
//! services and `.into()` the result.

pub mod auth;
pub mod handlers;
pub mod state;
pub mod wire;

#[cfg(test)]
mod tests;

use axum::Router;
use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use std::sync::Arc;

use crate::core::AceCore;
use state::AppState;

/// Routes requiring the bearer API key (everything except health/ready).
pub fn protected_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/analysis/root", post(handlers::analysis::submit_root))
        .route("/analysis/root/:uuid", get(handlers::analysis::get_root))
        .route("/analysis/result", post(handlers::analysis::post_result))
        .route("/module/type", post(handlers::modules::register_module))
        .route("/module/type/:name", get(handlers::modules::get_module))
        .route("/work/:amt_name", get(handlers::work::get_next_request))
        .route("/work/:id/ack", post(handlers::work::ack_work))
        .route("/blob", post(handlers::blobs::upload_blob))
        .route("/blob/:sha256", get(handlers::blobs::download_blob))
        .route("/events", get(handlers::events::poll_events))
        .with_state(state.clone())
        .layer(axum_middleware::from_fn_with_state(state, auth::require_bearer_api_key))
}

/// Liveness/readiness endpoints, unauthenticated — ambient, carried forward
/// regardless of Non-goals (`SPEC_FULL.md` §1.1).
pub fn health_router() -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::ready_check))
}

pub fn build(core: Arc<AceCore>, api_key: String) -> Router {
    let state = Arc::new(AppState { core, api_key });
    Router::new().merge(protected_router(state)).merge(health_router())
}
