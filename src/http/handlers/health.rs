//! Liveness/readiness — ambient endpoints carried forward unconditionally
//! (`SPEC_FULL.md` §4), mirroring the teacher's `health_check`/`ready_check`.

#[utoipa::path(get, path = "/health", responses((status = 200, description = "Always OK")), tag = "System")]
pub async fn health_check() -> &'static str {
    "OK"
}

#[utoipa::path(get, path = "/ready", responses((status = 200, description = "Ready to serve")), tag = "System")]
pub async fn ready_check() -> &'static str {
    "READY"
}
