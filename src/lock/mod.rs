//! Named exclusive leases with deadlock detection (§4.5).

mod memory;

pub use memory::InMemoryLockManager;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::AceResult;

#[async_trait]
pub trait LockManager: Send + Sync {
    /// Blocks up to `wait` trying to acquire `name` for `owner`, holding it
    /// for `lease` once granted. Fails with `AceError::Deadlock` if granting
    /// would close a wait-for cycle, or `AceError::Timeout` if `wait`
    /// elapses first.
    async fn acquire(&self, name: &str, owner: &str, lease: Duration, wait: Duration) -> AceResult<()>;

    /// No-op if `name` isn't held by `owner`.
    async fn release(&self, name: &str, owner: &str);

    async fn renew(&self, name: &str, owner: &str, lease: Duration) -> AceResult<()>;

    /// Reclaims any lease past its deadline. Called lazily by `acquire` and
    /// periodically by the lease-expiry sweeper.
    async fn reclaim_expired(&self) -> usize;
}

/// By convention (§4.5), the root lock uses this name.
pub fn root_lock_name(root_uuid: uuid::Uuid) -> String {
    format!("root:{root_uuid}")
}
