//! ACE Core
//!
//! A recursive, pluggable analysis orchestration engine: submit an
//! observable tree (`RootAnalysis`), dispatch it to registered analysis
//! module types, merge their results back in, and repeat until nothing new
//! is outstanding. See `SPEC_FULL.md` for the full module-by-module
//! contract this crate implements.

pub mod blob;
pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod facade;
pub mod http;
pub mod lock;
pub mod model;
pub mod processor;
pub mod queue;
pub mod registry;
pub mod trackers;
pub mod utils;

#[cfg(test)]
pub mod test_support;

pub use config::Config;
pub use core::{AceCore, AceCoreBuilder};
pub use error::{AceError, AceResult};
pub use facade::{InProcessFacade, RemoteFacade};
pub use model::{
    Analysis, AnalysisModuleType, AnalysisRequest, AnalysisResult, BlobHandle, Observable,
    ObservableKey, RootAnalysis, SCHEMA_VERSION,
};
