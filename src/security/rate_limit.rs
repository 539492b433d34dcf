//! Fixed-window rate limiting per client key.
//!
//! Windows live in a sharded map, so concurrent clients only contend when
//! their keys hash to the same shard. Time is passed in by the caller, which
//! keeps the limiter deterministic under test.
//!
//! At `max_tracked_clients` the oldest window is evicted from an arrival
//! queue rather than by scanning the map. Entries whose window was renewed
//! since they were queued go to the back with their new start.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::security::client_key::ClientKey;

/// Counter for one client in one window.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    window_start: Instant,
    count: u32,
    /// Distinguishes this window from a later one under the same key.
    id: u64,
}

impl RateWindow {
    /// A window is over once its duration elapsed, or if the clock went backwards.
    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        match now.checked_duration_since(self.window_start) {
            Some(elapsed) => elapsed >= window,
            None => true,
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub admitted: bool,
    /// Configured requests per window.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
    /// Window length, for the `RateLimit-Policy` header.
    pub window: Duration,
}

/// Queue entry pointing at a window as it was when queued.
#[derive(Debug)]
struct Arrival {
    key: ClientKey,
    id: u64,
    window_start: Instant,
}

/// Per-client fixed-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<ClientKey, RateWindow>,
    arrivals: Mutex<VecDeque<Arrival>>,
    next_id: AtomicU64,
    limit: u32,
    window: Duration,
    max_tracked: usize,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            arrivals: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(0),
            limit,
            window,
            max_tracked: 100_000,
            enabled: true,
        }
    }

    /// A limiter that admits every request.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(u32::MAX, Duration::from_secs(1))
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new(config.max_requests, Duration::from_millis(config.window_ms))
            .with_max_tracked_clients(config.max_tracked_clients)
    }

    pub fn with_max_tracked_clients(mut self, max: usize) -> Self {
        self.max_tracked = max.max(1);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of client windows currently held.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Admit or reject one request from `key` at time `now`.
    pub fn admit(&self, key: &ClientKey, now: Instant) -> RateDecision {
        if !self.enabled {
            return RateDecision {
                admitted: true,
                limit: self.limit,
                remaining: self.limit,
                reset_after: Duration::ZERO,
                window: self.window,
            };
        }

        if !self.windows.contains_key(key) && self.windows.len() >= self.max_tracked {
            self.evict_oldest();
        }

        let mut inserted = None;
        let decision = {
            let mut entry = self.windows.entry(key.clone()).or_insert_with(|| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                inserted = Some(id);
                RateWindow {
                    window_start: now,
                    count: 0,
                    id,
                }
            });
            let state = entry.value_mut();

            if state.is_expired(now, self.window) {
                state.window_start = now;
                state.count = 0;
            }

            let admitted = state.count < self.limit;
            if admitted {
                state.count += 1;
            }

            let elapsed = now.saturating_duration_since(state.window_start);
            RateDecision {
                admitted,
                limit: self.limit,
                remaining: self.limit - state.count,
                reset_after: self.window.saturating_sub(elapsed),
                window: self.window,
            }
        };

        // shard guard is released before the queue lock is taken
        if let Some(id) = inserted {
            self.arrivals().push_back(Arrival {
                key: key.clone(),
                id,
                window_start: now,
            });
        }
        decision
    }

    /// Drop windows that have expired at `now`. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.window;
        self.windows.retain(|_, state| !state.is_expired(now, window));
        let removed = before.saturating_sub(self.windows.len());

        let queued = std::mem::take(&mut *self.arrivals());
        let mut live: VecDeque<Arrival> = queued
            .into_iter()
            .filter(|arrival| self.is_current(arrival.id, &arrival.key))
            .collect();
        let mut arrivals = self.arrivals();
        live.extend(arrivals.drain(..));
        *arrivals = live;

        removed
    }

    /// Remove the window with the oldest start, as far as the queue knows.
    fn evict_oldest(&self) {
        loop {
            let Some(arrival) = self.arrivals().pop_front() else {
                return;
            };
            let current = self
                .windows
                .get(&arrival.key)
                .filter(|window| window.id == arrival.id)
                .map(|window| window.window_start);

            match current {
                // gone or replaced; a newer arrival covers the key
                None => continue,
                Some(start) if start != arrival.window_start => {
                    self.arrivals().push_back(Arrival {
                        window_start: start,
                        ..arrival
                    });
                }
                Some(_) => {
                    let removed = self
                        .windows
                        .remove_if(&arrival.key, |_, window| window.id == arrival.id)
                        .is_some();
                    if removed {
                        tracing::debug!(client = %arrival.key, "Evicted oldest rate window");
                        return;
                    }
                }
            }
        }
    }

    fn is_current(&self, id: u64, key: &ClientKey) -> bool {
        self.windows.get(key).is_some_and(|window| window.id == id)
    }

    fn arrivals(&self) -> MutexGuard<'_, VecDeque<Arrival>> {
        self.arrivals.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
