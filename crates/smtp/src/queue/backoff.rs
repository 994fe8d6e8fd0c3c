/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Exponential backoff with jitter (§4.4 retry schedule).

use std::time::Duration;

use rand::Rng;

/// `min(base * 2^(attempts-1), max)` seconds, plus up to `jitter_pct` of
/// that value applied symmetrically (default ±20%).
pub fn backoff_duration(
    attempts: u32,
    base: Duration,
    max: Duration,
    jitter_pct: f64,
) -> Duration {
    let exp = attempts.saturating_sub(1).min(20);
    let scaled = base.as_secs_f64() * 2f64.powi(exp as i32);
    let capped = scaled.min(max.as_secs_f64());
    let jitter = capped * jitter_pct;
    let delta = rand::thread_rng().gen_range(-jitter..=jitter);
    Duration::from_secs_f64((capped + delta).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_at_max_backoff() {
        let d = backoff_duration(10, Duration::from_secs(30), Duration::from_secs(3600), 0.0);
        assert_eq!(d, Duration::from_secs(3600));
    }

    #[test]
    fn first_attempt_is_base() {
        let d = backoff_duration(1, Duration::from_secs(30), Duration::from_secs(3600), 0.0);
        assert_eq!(d, Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..50 {
            let d = backoff_duration(2, Duration::from_secs(30), Duration::from_secs(3600), 0.2);
            assert!(d.as_secs_f64() >= 60.0 * 0.8 - 0.01);
            assert!(d.as_secs_f64() <= 60.0 * 1.2 + 0.01);
        }
    }
}
