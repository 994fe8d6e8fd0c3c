/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Outbound delivery queue (C5, §4.4): a durable Redis-backed `pending`/
//! `sent`/`failed` set of [`QueueMessage`]s, a worker loop competing for
//! ready entries, and a retry schedule with exponential backoff plus
//! jitter. The actual SMTP dial to a remote MX is an injected
//! [`RemoteDeliverer`] — DNS resolution and outbound TLS/SMTP client
//! plumbing are external collaborators the same way DKIM signing is.

mod backoff;
mod redis_queue;
mod worker;

pub use backoff::backoff_duration;
pub use redis_queue::{QueueError, RedisQueue};
pub use worker::{run_worker, DeliverOutcome, RemoteDeliverer, WorkerConfig};

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    Pending,
    Sending,
    Sent,
    Failed,
    Retrying,
}

/// Outbound message metadata (§3 QueueMessage). The body itself lives on
/// disk at `message_path`; only this record lives in the queue store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: Uuid,
    pub sender: String,
    pub recipients: Vec<String>,
    pub message_path: PathBuf,
    pub size: u64,
    pub domain: String,
    pub status: QueueStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl QueueMessage {
    /// Builds a fresh entry ready for `Enqueue` (§4.4 enqueue contract):
    /// a UUID, `status=Pending`, `attempts=0`, `next_attempt_at=now`.
    pub fn new(sender: String, recipients: Vec<String>, message_path: PathBuf, size: u64) -> Self {
        let domain = recipients
            .first()
            .and_then(|r| r.rsplit_once('@'))
            .map(|(_, d)| d.to_string())
            .unwrap_or_default();
        QueueMessage {
            id: Uuid::new_v4(),
            sender,
            recipients,
            message_path,
            size,
            domain,
            status: QueueStatus::Pending,
            attempts: 0,
            max_attempts: 5,
            next_attempt_at: Utc::now(),
            last_error: None,
        }
    }
}
