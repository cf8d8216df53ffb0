//! Shared handler state (teacher's `AppState` pattern, minus the
//! service-per-domain sprawl — this core has one subsystem bundle).

use std::sync::Arc;

use crate::core::AceCore;

pub struct AppState {
    pub core: Arc<AceCore>,
    pub api_key: String,
}
