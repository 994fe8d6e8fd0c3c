/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Bounded concurrency gate shared behind a `DashMap` entry (per-connection
/// limits, per-destination throttles). Acquiring returns a guard that
/// releases the slot on drop.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    max: usize,
    current: Arc<AtomicUsize>,
}

impl ConcurrencyLimiter {
    pub fn new(max: usize) -> Self {
        ConcurrencyLimiter {
            max,
            current: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.load(Ordering::Relaxed) > 0
    }

    pub fn try_acquire(&self) -> Option<InFlight> {
        if self.max == 0 {
            return Some(InFlight {
                current: self.current.clone(),
            });
        }
        loop {
            let cur = self.current.load(Ordering::Acquire);
            if cur >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(cur, cur + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(InFlight {
                    current: self.current.clone(),
                });
            }
        }
    }
}

/// RAII guard released when dropped, decrementing the limiter's counter.
pub struct InFlight {
    current: Arc<AtomicUsize>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_concurrency() {
        let limiter = ConcurrencyLimiter::new(2);
        let a = limiter.try_acquire().unwrap();
        let b = limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_none());
        drop(a);
        assert!(limiter.try_acquire().is_some());
        drop(b);
    }
}
