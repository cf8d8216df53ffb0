//! `AnalysisRequest` — a queued unit of work (§3) — and `AnalysisResult`, a
//! completed request carrying `root_before` and the mutated root.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::ObservableKey;
use super::module_type::AnalysisModuleType;
use super::root::RootAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Queued,
    Leased,
    Completed,
    Failed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AnalysisRequest {
    pub id: Uuid,
    pub root_uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observable: Option<ObservableKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amt: Option<AnalysisModuleType>,
    /// Baseline for the eventual diff-merge (§3, §4.2 step 1/4).
    pub root_before: RootAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub state: RequestState,
}

impl AnalysisRequest {
    /// A fresh root-only submission: no observable, no AMT.
    pub fn root_submission(root_before: RootAnalysis) -> Self {
        Self {
            id: Uuid::new_v4(),
            root_uuid: root_before.uuid,
            observable: None,
            amt: None,
            root_before,
            lease_owner: None,
            lease_expires_at: None,
            state: RequestState::Queued,
        }
    }

    /// A `(root, observable, AMT)` unit of analysis work (§4.2 step 5).
    pub fn observable_work(
        root_before: RootAnalysis,
        observable: ObservableKey,
        amt: AnalysisModuleType,
    ) -> Self {
        let root_uuid = root_before.uuid;
        Self {
            id: Uuid::new_v4(),
            root_uuid,
            observable: Some(observable),
            amt: Some(amt),
            root_before,
            lease_owner: None,
            lease_expires_at: None,
            state: RequestState::Queued,
        }
    }

    pub fn is_leased(&self) -> bool {
        self.state == RequestState::Leased
    }

    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.lease_expires_at, Some(exp) if exp <= now)
    }
}

/// A completed `AnalysisRequest` posted back by a module manager (§4.2
/// step 4): carries the pre-analysis baseline and the module's mutated
/// copy of the root.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AnalysisResult {
    pub request_id: Uuid,
    pub root_uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observable: Option<ObservableKey>,
    pub amt_name: String,
    pub amt_version: u32,
    pub root_before: RootAnalysis,
    pub root: RootAnalysis,
}
