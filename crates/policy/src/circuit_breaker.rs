/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Per-destination circuit breaker (§4.4/§4.6): `Closed -> Open -> HalfOpen
//! -> Closed`, keyed by recipient domain, in a `DashMap`-backed registry;
//! state per key is guarded by a `parking_lot::Mutex` since transitions
//! must be read-modify-write atomic.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            half_open_max_calls: 3,
        }
    }
}

#[derive(Debug)]
struct Entry {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
}

impl Default for Entry {
    fn default() -> Self {
        Entry {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            half_open_in_flight: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitOpenError;

impl std::fmt::Display for CircuitOpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "circuit open")
    }
}
impl std::error::Error for CircuitOpenError {}

pub type StateChangeCallback = Arc<dyn Fn(&str, CircuitState) + Send + Sync>;

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    entries: DashMap<String, Mutex<Entry>>,
    on_state_change: Option<StateChangeCallback>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        CircuitBreaker {
            config,
            entries: DashMap::new(),
            on_state_change: None,
        }
    }

    pub fn with_callback(mut self, callback: StateChangeCallback) -> Self {
        self.on_state_change = Some(callback);
        self
    }

    /// Call before attempting a remote operation for `key`. Returns
    /// `Err(CircuitOpenError)` if the breaker is Open and `timeout` has not
    /// elapsed, or if HalfOpen and `half_open_max_calls` is already in
    /// flight.
    pub fn before_call(&self, key: &str) -> Result<(), CircuitOpenError> {
        let guard = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(Entry::default()));
        let mut entry = guard.lock();
        match entry.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = entry
                    .opened_at
                    .map(|at| Instant::now().duration_since(at))
                    .unwrap_or_default();
                if elapsed >= self.config.timeout {
                    entry.state = CircuitState::HalfOpen;
                    entry.half_open_in_flight = 1;
                    entry.consecutive_successes = 0;
                    drop(entry);
                    self.notify(key, CircuitState::HalfOpen);
                    Ok(())
                } else {
                    Err(CircuitOpenError)
                }
            }
            CircuitState::HalfOpen => {
                if entry.half_open_in_flight < self.config.half_open_max_calls {
                    entry.half_open_in_flight += 1;
                    Ok(())
                } else {
                    Err(CircuitOpenError)
                }
            }
        }
    }

    pub fn record_success(&self, key: &str) {
        let Some(guard) = self.entries.get(key) else {
            return;
        };
        let mut entry = guard.lock();
        match entry.state {
            CircuitState::Closed => {
                entry.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                entry.half_open_in_flight = entry.half_open_in_flight.saturating_sub(1);
                entry.consecutive_successes += 1;
                if entry.consecutive_successes >= self.config.success_threshold {
                    entry.state = CircuitState::Closed;
                    entry.consecutive_failures = 0;
                    entry.consecutive_successes = 0;
                    drop(entry);
                    self.notify(key, CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self, key: &str) {
        let guard = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(Entry::default()));
        let mut entry = guard.lock();
        match entry.state {
            CircuitState::Closed => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= self.config.failure_threshold {
                    entry.state = CircuitState::Open;
                    entry.opened_at = Some(Instant::now());
                    drop(entry);
                    self.notify(key, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                entry.half_open_in_flight = entry.half_open_in_flight.saturating_sub(1);
                entry.state = CircuitState::Open;
                entry.opened_at = Some(Instant::now());
                entry.consecutive_failures = self.config.failure_threshold;
                drop(entry);
                self.notify(key, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self, key: &str) -> CircuitState {
        self.entries
            .get(key)
            .map(|guard| guard.lock().state)
            .unwrap_or(CircuitState::Closed)
    }

    fn notify(&self, key: &str, state: CircuitState) {
        if let Some(callback) = &self.on_state_change {
            callback(key, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            timeout: Duration::from_millis(50),
            half_open_max_calls: 1,
        });
        for _ in 0..3 {
            breaker.before_call("example.com").unwrap();
            breaker.record_failure("example.com");
        }
        assert_eq!(breaker.state("example.com"), CircuitState::Open);
        assert!(breaker.before_call("example.com").is_err());
    }

    #[tokio::test]
    async fn half_opens_after_timeout_then_closes_on_success() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            timeout: Duration::from_millis(20),
            half_open_max_calls: 1,
        });
        breaker.before_call("d").unwrap();
        breaker.record_failure("d");
        assert_eq!(breaker.state("d"), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        breaker.before_call("d").unwrap();
        assert_eq!(breaker.state("d"), CircuitState::HalfOpen);
        breaker.record_success("d");
        assert_eq!(breaker.state("d"), CircuitState::Closed);
    }
}
