//! Identity types: observable identity (§3) and content-addressed blob
//! handles (§4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `(type, value, time?)` — an observable's identity. Equality ignores
/// every other field on `Observable`; merges key on this triple (§3
/// invariant 1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ObservableKey {
    #[serde(rename = "type")]
    pub obs_type: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

impl ObservableKey {
    pub fn new(obs_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self { obs_type: obs_type.into(), value: value.into(), time: None }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }
}

impl fmt::Display for ObservableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.time {
            Some(t) => write!(f, "{}:{}@{}", self.obs_type, self.value, t.to_rfc3339()),
            None => write!(f, "{}:{}", self.obs_type, self.value),
        }
    }
}

/// A lowercase-hex sha256 handle into the blob store (§4.8). Transport
/// layers carry this, never the body, unless `load_details` is called
/// explicitly (§9 "lazy details").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(transparent)]
pub struct BlobHandle(pub String);

impl BlobHandle {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn storage_subpath(&self) -> (String, String) {
        let prefix = self.0.get(0..2).unwrap_or(&self.0).to_string();
        (prefix, self.0.clone())
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
