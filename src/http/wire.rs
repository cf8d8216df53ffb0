//! Wire envelopes: every inbound body carries a `schema_version` field
//! (§6), fixed at `1` in this implementation — an unrecognized version is
//! rejected as `ValidationFailed` rather than guessed at
//! (`SPEC_FULL.md` §5).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AceError, AceResult};
use crate::model::{AnalysisModuleType, AnalysisRequest, AnalysisResult, RootAnalysis, SCHEMA_VERSION};

pub fn check_schema_version(v: u32) -> AceResult<()> {
    if v != SCHEMA_VERSION {
        return Err(AceError::validation(format!(
            "unsupported schema_version {v}, this server understands {SCHEMA_VERSION}"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRootRequest {
    pub schema_version: u32,
    pub root: RootAnalysis,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostResultRequest {
    pub schema_version: u32,
    pub result: AnalysisResult,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterModuleRequest {
    pub schema_version: u32,
    pub module_type: AnalysisModuleType,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RootResponse {
    pub schema_version: u32,
    pub root: RootAnalysis,
}

impl From<RootAnalysis> for RootResponse {
    fn from(root: RootAnalysis) -> Self {
        Self { schema_version: SCHEMA_VERSION, root }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkResponse {
    pub schema_version: u32,
    pub request: Option<AnalysisRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BlobUploadResponse {
    pub sha256: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GetWorkQuery {
    pub owner: String,
    pub visibility_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EventsQuery {
    pub topic: String,
    pub timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_schema_version_passes() {
        assert!(check_schema_version(SCHEMA_VERSION).is_ok());
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        assert!(matches!(check_schema_version(999), Err(AceError::ValidationFailed(_))));
    }
}
