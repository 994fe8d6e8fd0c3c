/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Per-IP authentication rate limiter (§4.6): a sliding window of failures
//! that blocks further attempts once `max_attempts` is reached, using the
//! same per-key `DashMap` registry pattern as the circuit breaker.

use std::{net::IpAddr, time::Duration};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct AuthLimiterConfig {
    pub window_size: Duration,
    pub max_attempts: u32,
    pub block_duration: Duration,
}

impl Default for AuthLimiterConfig {
    fn default() -> Self {
        AuthLimiterConfig {
            window_size: Duration::from_secs(15 * 60),
            max_attempts: 5,
            block_duration: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    failures: Vec<Instant>,
    blocked_at: Option<Instant>,
}

pub struct AuthRateLimiter {
    config: AuthLimiterConfig,
    entries: DashMap<IpAddr, Mutex<Entry>>,
}

impl AuthRateLimiter {
    pub fn new(config: AuthLimiterConfig) -> Self {
        AuthRateLimiter {
            config,
            entries: DashMap::new(),
        }
    }

    /// Records an authentication failure from `ip`; returns `true` if this
    /// failure pushed the IP over `max_attempts` and it is now blocked.
    pub fn record_failure(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let guard = self
            .entries
            .entry(ip)
            .or_insert_with(|| Mutex::new(Entry::default()));
        let mut entry = guard.lock();
        entry
            .failures
            .retain(|t| now.duration_since(*t) < self.config.window_size);
        entry.failures.push(now);
        if entry.failures.len() as u32 >= self.config.max_attempts {
            entry.blocked_at = Some(now);
            true
        } else {
            false
        }
    }

    /// `true` while the IP remains inside its `block_duration` window.
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        let Some(guard) = self.entries.get(&ip) else {
            return false;
        };
        let entry = guard.lock();
        match entry.blocked_at {
            Some(at) => Instant::now().duration_since(at) < self.config.block_duration,
            None => false,
        }
    }

    /// Clears the IP's record entirely on a successful authentication.
    pub fn record_success(&self, ip: IpAddr) {
        self.entries.remove(&ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn blocks_after_max_attempts() {
        let limiter = AuthRateLimiter::new(AuthLimiterConfig {
            window_size: Duration::from_secs(900),
            max_attempts: 3,
            block_duration: Duration::from_secs(60),
        });
        let ip = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1));
        assert!(!limiter.record_failure(ip));
        assert!(!limiter.record_failure(ip));
        assert!(limiter.record_failure(ip));
        assert!(limiter.is_blocked(ip));
    }

    #[test]
    fn success_clears_record() {
        let limiter = AuthRateLimiter::new(AuthLimiterConfig {
            window_size: Duration::from_secs(900),
            max_attempts: 1,
            block_duration: Duration::from_secs(60),
        });
        let ip = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 2));
        assert!(limiter.record_failure(ip));
        limiter.record_success(ip);
        assert!(!limiter.is_blocked(ip));
    }
}
