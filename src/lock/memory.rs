use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::LockManager;
use crate::error::{AceError, AceResult};

struct Holder {
    owner: String,
    expires_at: DateTime<Utc>,
}

/// In-memory lock table plus a wait-for graph used purely for deadlock
/// detection (§4.5). An owner has at most one outstanding acquire attempt at
/// a time, matching the module-manager usage pattern described in §4.2.
#[derive(Default)]
struct State {
    held: HashMap<String, Holder>,
    /// owner -> lock name it is currently blocked trying to acquire.
    waiting_for: HashMap<String, String>,
}

impl State {
    fn reclaim_expired_locked(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> =
            self.held.iter().filter(|(_, h)| h.expires_at <= now).map(|(name, _)| name.clone()).collect();
        for name in &expired {
            self.held.remove(name);
        }
        if !expired.is_empty() {
            tracing::warn!(count = expired.len(), "reclaimed expired locks");
        }
        expired.len()
    }

    /// Walks the wait-for chain starting at `start`'s current holder: if it
    /// ever leads back to `owner`, granting `owner`'s pending wait would
    /// close a cycle.
    fn would_deadlock(&self, owner: &str, held_by: &str) -> bool {
        let mut cur = held_by.to_string();
        let mut steps = 0;
        loop {
            if cur == owner {
                return true;
            }
            steps += 1;
            if steps > self.held.len() + self.waiting_for.len() + 1 {
                return false;
            }
            let Some(blocked_on) = self.waiting_for.get(&cur) else {
                return false;
            };
            let Some(next_holder) = self.held.get(blocked_on) else {
                return false;
            };
            cur = next_holder.owner.clone();
        }
    }
}

pub struct InMemoryLockManager {
    state: Mutex<State>,
    poll_interval: Duration,
}

impl Default for InMemoryLockManager {
    fn default() -> Self {
        Self { state: Mutex::new(State::default()), poll_interval: Duration::from_millis(10) }
    }
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(&self, name: &str, owner: &str, lease: Duration, wait: Duration) -> AceResult<()> {
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut state = self.state.lock().unwrap();
                let now = Utc::now();
                state.reclaim_expired_locked(now);

                match state.held.get(name) {
                    None => {
                        state.waiting_for.remove(owner);
                        let expires_at = now + chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::seconds(60));
                        state.held.insert(name.to_string(), Holder { owner: owner.to_string(), expires_at });
                        return Ok(());
                    }
                    Some(holder) if holder.owner == owner => {
                        state.waiting_for.remove(owner);
                        return Ok(());
                    }
                    Some(holder) => {
                        let holder_owner = holder.owner.clone();
                        if state.would_deadlock(owner, &holder_owner) {
                            state.waiting_for.remove(owner);
                            return Err(AceError::deadlock(format!(
                                "acquiring {name} for {owner} would close a wait-for cycle through {holder_owner}"
                            )));
                        }
                        state.waiting_for.insert(owner.to_string(), name.to_string());
                    }
                }
            }

            if Instant::now() >= deadline {
                self.state.lock().unwrap().waiting_for.remove(owner);
                return Err(AceError::timeout(format!("timed out waiting {wait:?} for lock {name}")));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn release(&self, name: &str, owner: &str) {
        let mut state = self.state.lock().unwrap();
        if matches!(state.held.get(name), Some(h) if h.owner == owner) {
            state.held.remove(name);
        }
    }

    async fn renew(&self, name: &str, owner: &str, lease: Duration) -> AceResult<()> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let holder = state
            .held
            .get_mut(name)
            .ok_or_else(|| AceError::not_found(format!("lock {name} is not held")))?;
        if holder.owner != owner {
            return Err(AceError::conflict(format!("lock {name} is not held by {owner}")));
        }
        holder.expires_at = now + chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::seconds(60));
        Ok(())
    }

    async fn reclaim_expired(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.reclaim_expired_locked(Utc::now())
    }
}
