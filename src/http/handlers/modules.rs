//! `/module/type*` handlers (§4.3: register/version/expire AMTs).

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::AceResult;
use crate::http::state::AppState;
use crate::http::wire::{RegisterModuleRequest, check_schema_version};
use crate::model::AnalysisModuleType;
use crate::registry::RegisterOutcome;

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterModuleResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_version: Option<u32>,
}

impl From<RegisterOutcome> for RegisterModuleResponse {
    fn from(outcome: RegisterOutcome) -> Self {
        match outcome {
            RegisterOutcome::New => Self { outcome: "new", old_version: None },
            RegisterOutcome::Unchanged => Self { outcome: "unchanged", old_version: None },
            RegisterOutcome::Replaced { old_version } => {
                Self { outcome: "replaced", old_version: Some(old_version) }
            },
        }
    }
}

#[utoipa::path(
    post,
    path = "/module/type",
    request_body = RegisterModuleRequest,
    responses((status = 200, description = "Module type registered", body = RegisterModuleResponse)),
    tag = "Modules",
    security(("bearer_auth" = []))
)]
pub async fn register_module(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterModuleRequest>,
) -> AceResult<Json<RegisterModuleResponse>> {
    check_schema_version(body.schema_version)?;
    let outcome = state.core.register_module(body.module_type).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    get,
    path = "/module/type/{name}",
    params(("name" = String, Path, description = "Module type name")),
    responses((status = 200, description = "Module type found", body = AnalysisModuleType)),
    tag = "Modules",
    security(("bearer_auth" = []))
)]
pub async fn get_module(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AceResult<Json<AnalysisModuleType>> {
    state
        .core
        .get_module(&name)
        .await
        .map(Json)
        .ok_or_else(|| crate::error::AceError::not_found(format!("no module type {name}")))
}
