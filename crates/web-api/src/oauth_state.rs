//! Single-use OAuth `state` values issued by `/oauth/authorize`.
//!
//! Entries expire after a TTL and the set is capped, so unauthenticated
//! authorize calls cannot grow it without bound.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// How long a consent redirect stays redeemable.
pub const STATE_TTL: Duration = Duration::from_secs(600);

/// Upper bound on outstanding states; the oldest is evicted past this.
pub const MAX_PENDING_STATES: usize = 1024;

#[derive(Debug)]
pub struct PendingStates {
    ttl: Duration,
    capacity: usize,
    issued: Mutex<HashMap<String, Instant>>,
}

impl Default for PendingStates {
    fn default() -> Self {
        Self::new(STATE_TTL, MAX_PENDING_STATES)
    }
}

impl PendingStates {
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            issued: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue(&self, state: String) {
        self.issue_at(state, Instant::now());
    }

    /// Removes `state` and reports whether it was issued and still fresh.
    pub fn take(&self, state: &str) -> bool {
        self.take_at(state, Instant::now())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.issued.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issued.lock().is_empty()
    }

    fn issue_at(&self, state: String, now: Instant) {
        let mut issued = self.issued.lock();
        let before = issued.len();
        issued.retain(|_, at| now.saturating_duration_since(*at) < self.ttl);

        let mut evicted = 0usize;
        while issued.len() >= self.capacity {
            let oldest = issued
                .iter()
                .min_by_key(|(_, at)| **at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    issued.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }
        if before != issued.len() {
            tracing::debug!(
                expired = before - issued.len() - evicted,
                evicted,
                "pruned pending OAuth states"
            );
        }

        issued.insert(state, now);
    }

    fn take_at(&self, state: &str, now: Instant) -> bool {
        self.issued
            .lock()
            .remove(state)
            .is_some_and(|at| now.saturating_duration_since(at) < self.ttl)
    }
}
