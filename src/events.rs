//! Event bus (§4.7): topic-based fan-out with per-root ordering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_uuid: Option<Uuid>,
    pub emitted_at: DateTime<Utc>,
}

const CHANNEL_CAPACITY: usize = 1024;

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes to `topic`. Ordering across calls on the same bus instance
    /// for events sharing a `root_uuid` is preserved (§5 "events for a given
    /// root are emitted in the order mutations were committed") — callers
    /// are expected to invoke this from inside the root lock they already
    /// hold, so emit order already matches commit order.
    async fn emit(&self, topic: &str, payload: Value, root_uuid: Option<Uuid>);

    /// A fresh subscription sees only events emitted after this call.
    async fn subscribe(&self, topic: &str) -> broadcast::Receiver<Event>;
}

#[derive(Default)]
pub struct InMemoryEventBus {
    topics: DashMap<String, broadcast::Sender<Event>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<Event> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn emit(&self, topic: &str, payload: Value, root_uuid: Option<Uuid>) {
        let event = Event { topic: topic.to_string(), payload, root_uuid, emitted_at: Utc::now() };
        // A send with no subscribers is a normal, silent no-op — delivery is
        // at-least-best-effort, not guaranteed (§4.7).
        let _ = self.sender_for(topic).send(event);
    }

    async fn subscribe(&self, topic: &str) -> broadcast::Receiver<Event> {
        self.sender_for(topic).subscribe()
    }
}
