/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::time::Duration;

use tokio::time::Instant;

/// Every externally facing operation accepts a deadline (§5). On expiry the
/// caller is responsible for mapping to its protocol-specific timeout
/// response (SMTP `421`, IMAP command abort, storage rollback, queue
/// release-back-to-pending).
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Deadline {
            at: Instant::now() + timeout,
        }
    }

    pub fn never() -> Self {
        Deadline {
            at: Instant::now() + Duration::from_secs(365 * 24 * 3600),
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub async fn run<T>(
        &self,
        fut: impl std::future::Future<Output = T>,
    ) -> Result<T, DeadlineExpired> {
        tokio::select! {
            out = fut => Ok(out),
            _ = tokio::time::sleep(self.remaining()) => Err(DeadlineExpired),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeadlineExpired;

impl std::fmt::Display for DeadlineExpired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deadline expired")
    }
}

impl std::error::Error for DeadlineExpired {}
