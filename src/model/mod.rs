//! The data model (§3): `RootAnalysis`, `Observable`, `Analysis`,
//! `AnalysisModuleType`, `AnalysisRequest`/`AnalysisResult`, identity types,
//! and the monotonic-set building block the merge engine relies on.

pub mod analysis;
pub mod ids;
pub mod module_type;
pub mod monotonic;
pub mod observable;
pub mod request;
pub mod root;

pub use analysis::{Analysis, AnalysisStatus};
pub use ids::{BlobHandle, ObservableKey};
pub use module_type::AnalysisModuleType;
pub use monotonic::MonotonicSet;
pub use observable::Observable;
pub use request::{AnalysisRequest, AnalysisResult, RequestState};
pub use root::RootAnalysis;

/// §6: "The schema is versioned by a top-level `schema_version` integer."
pub const SCHEMA_VERSION: u32 = 1;
