use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use super::WorkQueue;
use crate::error::{AceError, AceResult};
use crate::model::{AnalysisRequest, RequestState};

struct Lease {
    owner: String,
    expires_at: DateTime<Utc>,
    sequence: u64,
}

#[derive(Default)]
struct State {
    visible: VecDeque<Uuid>,
    leased: HashMap<Uuid, Lease>,
    entries: HashMap<Uuid, AnalysisRequest>,
    next_sequence: u64,
}

pub struct InMemoryWorkQueue {
    state: Mutex<State>,
}

impl Default for InMemoryWorkQueue {
    fn default() -> Self {
        Self { state: Mutex::new(State::default()) }
    }
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves every lease past its deadline back onto the visible queue,
    /// oldest-sequence-first, preserving the FIFO contract across an
    /// expiry wave (§4.4).
    fn reclaim_locked(state: &mut State, now: DateTime<Utc>) -> usize {
        let mut expired: Vec<(u64, Uuid)> =
            state.leased.iter().filter(|(_, l)| l.expires_at <= now).map(|(id, l)| (l.sequence, *id)).collect();
        expired.sort_by_key(|(seq, _)| *seq);
        for (_, id) in expired.iter().rev() {
            state.leased.remove(id);
            state.visible.push_front(*id);
            if let Some(req) = state.entries.get_mut(id) {
                req.state = RequestState::Queued;
                req.lease_owner = None;
                req.lease_expires_at = None;
            }
        }
        if !expired.is_empty() {
            tracing::warn!(count = expired.len(), "reclaimed expired work-queue leases");
        }
        expired.len()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn put(&self, mut request: AnalysisRequest) -> AceResult<()> {
        let mut state = self.state.lock().unwrap();
        request.state = RequestState::Queued;
        request.lease_owner = None;
        request.lease_expires_at = None;
        let id = request.id;
        state.visible.push_back(id);
        state.entries.insert(id, request);
        Ok(())
    }

    async fn get(&self, owner: &str, visibility_timeout: Duration) -> AceResult<Option<AnalysisRequest>> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        Self::reclaim_locked(&mut state, now);

        let Some(id) = state.visible.pop_front() else {
            return Ok(None);
        };
        let seq = state.next_sequence;
        state.next_sequence += 1;
        let expires_at = now + chrono::Duration::from_std(visibility_timeout).unwrap_or(chrono::Duration::seconds(60));
        state.leased.insert(id, Lease { owner: owner.to_string(), expires_at, sequence: seq });

        let request = state.entries.get_mut(&id).ok_or_else(|| {
            AceError::fatal("work queue entry missing for a visible id")
        })?;
        request.state = RequestState::Leased;
        request.lease_owner = Some(owner.to_string());
        request.lease_expires_at = Some(expires_at);
        Ok(Some(request.clone()))
    }

    async fn ack(&self, id: Uuid) -> AceResult<()> {
        let mut state = self.state.lock().unwrap();
        state.leased.remove(&id);
        state.entries.remove(&id);
        Ok(())
    }

    async fn nack(&self, id: Uuid) -> AceResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.leased.remove(&id).is_some() {
            state.visible.push_front(id);
            if let Some(req) = state.entries.get_mut(&id) {
                req.state = RequestState::Queued;
                req.lease_owner = None;
                req.lease_expires_at = None;
            }
        }
        Ok(())
    }

    async fn renew_lease(&self, id: Uuid, owner: &str, visibility_timeout: Duration) -> AceResult<()> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let lease = state
            .leased
            .get_mut(&id)
            .ok_or_else(|| AceError::not_found(format!("no active lease for request {id}")))?;
        if lease.owner != owner {
            return Err(AceError::conflict(format!("request {id} is not leased by {owner}")));
        }
        let expires_at = now + chrono::Duration::from_std(visibility_timeout).unwrap_or(chrono::Duration::seconds(60));
        lease.expires_at = expires_at;
        if let Some(req) = state.entries.get_mut(&id) {
            req.lease_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn reclaim_expired(&self) -> AceResult<usize> {
        let mut state = self.state.lock().unwrap();
        Ok(Self::reclaim_locked(&mut state, Utc::now()))
    }

    async fn size(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.entries.len()
    }
}
