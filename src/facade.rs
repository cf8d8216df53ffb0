//! Remote facade (§4.9): mirrors `AceCore`'s public operations as a
//! synchronous RPC-shaped trait. The in-process implementation simply calls
//! through; `aced`'s HTTP layer is the wire-format adapter built on top of
//! this same contract.

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::AceCore;
use crate::error::AceResult;
use crate::model::{AnalysisModuleType, AnalysisRequest, AnalysisResult, BlobHandle, RootAnalysis};
use crate::registry::RegisterOutcome;

#[async_trait]
pub trait RemoteFacade: Send + Sync {
    async fn submit_root(&self, root: RootAnalysis) -> AceResult<Uuid>;
    async fn post_result(&self, result: AnalysisResult) -> AceResult<Uuid>;
    async fn get_root(&self, uuid: Uuid) -> AceResult<RootAnalysis>;
    async fn register_module(&self, amt: AnalysisModuleType) -> AceResult<RegisterOutcome>;
    async fn get_module(&self, name: &str) -> Option<AnalysisModuleType>;
    async fn get_next_analysis_request(
        &self,
        amt_name: &str,
        amt_version: u32,
        owner: &str,
    ) -> AceResult<Option<AnalysisRequest>> {
        self.get_next_analysis_request_with_timeout(amt_name, amt_version, owner, None).await
    }
    async fn get_next_analysis_request_with_timeout(
        &self,
        amt_name: &str,
        amt_version: u32,
        owner: &str,
        visibility_timeout: Option<std::time::Duration>,
    ) -> AceResult<Option<AnalysisRequest>>;
    async fn ack_work(&self, amt_name: &str, amt_version: u32, request_id: Uuid) -> AceResult<()>;
    async fn upload_blob(&self, bytes: Vec<u8>) -> AceResult<BlobHandle>;
    async fn download_blob(&self, handle: &BlobHandle) -> AceResult<Option<Vec<u8>>>;
}

/// Calls straight through to a local `AceCore` — used both by `aced`'s HTTP
/// handlers and by tests that want facade-shaped access without a second
/// process.
pub struct InProcessFacade {
    core: std::sync::Arc<AceCore>,
}

impl InProcessFacade {
    pub fn new(core: std::sync::Arc<AceCore>) -> Self {
        Self { core }
    }
}

#[async_trait]
impl RemoteFacade for InProcessFacade {
    async fn submit_root(&self, root: RootAnalysis) -> AceResult<Uuid> {
        self.core.submit_root(root).await
    }

    async fn post_result(&self, result: AnalysisResult) -> AceResult<Uuid> {
        self.core.post_result(result).await
    }

    async fn get_root(&self, uuid: Uuid) -> AceResult<RootAnalysis> {
        self.core.get_root(uuid).await
    }

    async fn register_module(&self, amt: AnalysisModuleType) -> AceResult<RegisterOutcome> {
        self.core.register_module(amt).await
    }

    async fn get_module(&self, name: &str) -> Option<AnalysisModuleType> {
        self.core.get_module(name).await
    }

    async fn get_next_analysis_request_with_timeout(
        &self,
        amt_name: &str,
        amt_version: u32,
        owner: &str,
        visibility_timeout: Option<std::time::Duration>,
    ) -> AceResult<Option<AnalysisRequest>> {
        self.core.get_next_analysis_request(amt_name, amt_version, owner, visibility_timeout).await
    }

    async fn ack_work(&self, amt_name: &str, amt_version: u32, request_id: Uuid) -> AceResult<()> {
        self.core.ack_work(amt_name, amt_version, request_id).await
    }

    async fn upload_blob(&self, bytes: Vec<u8>) -> AceResult<BlobHandle> {
        self.core.store_blob(bytes).await
    }

    async fn download_blob(&self, handle: &BlobHandle) -> AceResult<Option<Vec<u8>>> {
        self.core.load_blob(handle).await
    }
}
