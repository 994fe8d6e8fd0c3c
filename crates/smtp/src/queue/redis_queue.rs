/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Redis-backed queue storage (§4.4, §6 queue key layout): `mq:msg:<id>`
//! hash, `mq:pending` zset scored by `next_attempt_at`, bounded `mq:sent`/
//! `mq:failed` lists.

use chrono::Utc;
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use uuid::Uuid;

use super::{QueueMessage, QueueStatus};

const SENT_LIST_MAX_LEN: isize = 10_000;
const FAILED_LIST_MAX_LEN: isize = 10_000;

/// Atomically pops the earliest-due pending id: `ZRANGEBYSCORE ... LIMIT 0 1`
/// then `ZREM`, so two competing workers never receive the same message
/// between the read and the remove (§4.4 worker loop, §5 ordering
/// guarantees).
const POP_READY_SCRIPT: &str = r#"
local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 1)
if #ids == 0 then
    return false
end
redis.call('ZREM', KEYS[1], ids[1])
return ids[1]
"#;

#[derive(Debug, Clone)]
pub enum QueueError {
    Redis(String),
    Serialize(String),
    NotFound,
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Redis(s) => write!(f, "redis error: {s}"),
            QueueError::Serialize(s) => write!(f, "serialization error: {s}"),
            QueueError::NotFound => write!(f, "message not found"),
        }
    }
}
impl std::error::Error for QueueError {}

impl From<redis::RedisError> for QueueError {
    fn from(e: redis::RedisError) -> Self {
        QueueError::Redis(e.to_string())
    }
}

fn msg_key(id: Uuid) -> String {
    format!("mq:msg:{id}")
}

#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
}

impl RedisQueue {
    pub async fn connect(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisQueue { conn })
    }

    /// Assigns defaults if absent, persists the hash, and scores it into
    /// `mq:pending` (§4.4 Enqueue contract).
    pub async fn enqueue(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let payload =
            serde_json::to_string(message).map_err(|e| QueueError::Serialize(e.to_string()))?;
        let score = message.next_attempt_at.timestamp();
        let _: () = redis::pipe()
            .atomic()
            .hset(msg_key(message.id), "data", payload)
            .ignore()
            .zadd("mq:pending", message.id.to_string(), score)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Pops the earliest-due message, if any, without deleting its hash.
    pub async fn pop_ready(&self) -> Result<Option<QueueMessage>, QueueError> {
        let mut conn = self.conn.clone();
        let now = Utc::now().timestamp();
        let id: Option<String> = Script::new(POP_READY_SCRIPT)
            .key("mq:pending")
            .arg(now)
            .invoke_async(&mut conn)
            .await?;
        let Some(id) = id else {
            return Ok(None);
        };
        self.load(Uuid::parse_str(&id).map_err(|e| QueueError::Serialize(e.to_string()))?)
            .await
    }

    pub async fn load(&self, id: Uuid) -> Result<Option<QueueMessage>, QueueError> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.hget(msg_key(id), "data").await?;
        match data {
            Some(data) => Ok(Some(
                serde_json::from_str(&data).map_err(|e| QueueError::Serialize(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Re-inserts into `mq:pending` with an updated score after a transient
    /// failure (§4.4 retry schedule).
    pub async fn reschedule(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.enqueue(message).await
    }

    /// Moves the message to the bounded `mq:sent` list and drops its hash.
    pub async fn mark_sent(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .lpush("mq:sent", message.id.to_string())
            .ignore()
            .ltrim("mq:sent", 0, SENT_LIST_MAX_LEN - 1)
            .ignore()
            .del(msg_key(message.id))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Moves the message to the bounded `mq:failed` list, keeping its hash
    /// (with `status=Failed`, `last_error` set) for operator inspection.
    pub async fn mark_failed(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let payload =
            serde_json::to_string(message).map_err(|e| QueueError::Serialize(e.to_string()))?;
        let _: () = redis::pipe()
            .atomic()
            .hset(msg_key(message.id), "data", payload)
            .ignore()
            .lpush("mq:failed", message.id.to_string())
            .ignore()
            .ltrim("mq:failed", 0, FAILED_LIST_MAX_LEN - 1)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

impl QueueMessage {
    pub fn with_status(mut self, status: QueueStatus) -> Self {
        self.status = status;
        self
    }
}
