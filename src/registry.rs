//! Module registry (§4.3): register/version/expire analysis module types.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::AceResult;
use crate::model::AnalysisModuleType;

#[derive(Clone, Copy)]
pub enum RegisterOutcome {
    /// No AMT existed under this name before.
    New,
    /// Re-registered at the same version — idempotent, no-op.
    Unchanged,
    /// Replaced an existing AMT at a different version.
    Replaced { old_version: u32 },
}

#[async_trait]
pub trait ModuleRegistry: Send + Sync {
    async fn register(&self, amt: AnalysisModuleType) -> AceResult<RegisterOutcome>;
    async fn unregister(&self, name: &str) -> AceResult<bool>;
    async fn get(&self, name: &str) -> Option<AnalysisModuleType>;
    async fn list(&self) -> Vec<AnalysisModuleType>;

    /// §4.3: "the core returns a leased request only if the version
    /// matches, else `None`" — the gate module-manager polling loops are
    /// built on.
    async fn is_current_version(&self, name: &str, version: u32) -> bool {
        matches!(self.get(name).await, Some(amt) if amt.version == version)
    }
}

/// In-process registry backed by `dashmap` (the teacher's choice for its
/// concurrent connection-pool table in `MySQLPoolManager`).
#[derive(Default)]
pub struct InMemoryModuleRegistry {
    modules: DashMap<String, AnalysisModuleType>,
}

impl InMemoryModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModuleRegistry for InMemoryModuleRegistry {
    async fn register(&self, amt: AnalysisModuleType) -> AceResult<RegisterOutcome> {
        let name = amt.name.clone();
        let outcome = match self.modules.get(&name) {
            None => RegisterOutcome::New,
            Some(existing) if existing.version == amt.version => RegisterOutcome::Unchanged,
            Some(existing) => RegisterOutcome::Replaced { old_version: existing.version },
        };
        if outcome != RegisterOutcome::Unchanged {
            tracing::info!(module = %name, version = amt.version, ?outcome, "module type registered");
        }
        self.modules.insert(name, amt);
        Ok(outcome)
    }

    async fn unregister(&self, name: &str) -> AceResult<bool> {
        let removed = self.modules.remove(name).is_some();
        if removed {
            tracing::info!(module = %name, "module type unregistered");
        }
        Ok(removed)
    }

    async fn get(&self, name: &str) -> Option<AnalysisModuleType> {
        self.modules.get(name).map(|r| r.clone())
    }

    async fn list(&self) -> Vec<AnalysisModuleType> {
        self.modules.iter().map(|r| r.value().clone()).collect()
    }
}

impl PartialEq for RegisterOutcome {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (RegisterOutcome::New, RegisterOutcome::New)
                | (RegisterOutcome::Unchanged, RegisterOutcome::Unchanged)
                | (RegisterOutcome::Replaced { .. }, RegisterOutcome::Replaced { .. })
        )
    }
}
impl Eq for RegisterOutcome {}

impl std::fmt::Debug for RegisterOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::Unchanged => write!(f, "Unchanged"),
            Self::Replaced { old_version } => write!(f, "Replaced {{ old_version: {old_version} }}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(name: &str, version: u32) -> AnalysisModuleType {
        AnalysisModuleType::new(name, version)
    }

    #[tokio::test]
    async fn register_is_idempotent_at_the_same_version() {
        let registry = InMemoryModuleRegistry::new();
        assert_eq!(registry.register(amt("amt_x", 1)).await.unwrap(), RegisterOutcome::New);
        assert_eq!(registry.register(amt("amt_x", 1)).await.unwrap(), RegisterOutcome::Unchanged);
    }

    #[tokio::test]
    async fn registering_a_new_version_replaces_atomically() {
        let registry = InMemoryModuleRegistry::new();
        registry.register(amt("amt_x", 1)).await.unwrap();
        let outcome = registry.register(amt("amt_x", 2)).await.unwrap();
        assert_eq!(outcome, RegisterOutcome::Replaced { old_version: 1 });
        assert!(registry.is_current_version("amt_x", 2).await);
        assert!(!registry.is_current_version("amt_x", 1).await);
    }

    #[tokio::test]
    async fn unregister_drops_the_module() {
        let registry = InMemoryModuleRegistry::new();
        registry.register(amt("amt_x", 1)).await.unwrap();
        assert!(registry.unregister("amt_x").await.unwrap());
        assert!(registry.get("amt_x").await.is_none());
        assert!(!registry.unregister("amt_x").await.unwrap());
    }
}
