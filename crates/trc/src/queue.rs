/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::{EventType, Level};

/// Events raised by the outbound delivery queue (C5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    Enqueued,
    AttemptStart,
    Delivered,
    Retrying,
    Failed,
    CircuitOpen,
    CircuitHalfOpen,
    CircuitClosed,
    RedisError,
}

impl EventType for QueueEvent {
    fn name(&self) -> &'static str {
        match self {
            QueueEvent::Enqueued => "queue.enqueued",
            QueueEvent::AttemptStart => "queue.attempt-start",
            QueueEvent::Delivered => "queue.delivered",
            QueueEvent::Retrying => "queue.retrying",
            QueueEvent::Failed => "queue.failed",
            QueueEvent::CircuitOpen => "queue.circuit-open",
            QueueEvent::CircuitHalfOpen => "queue.circuit-half-open",
            QueueEvent::CircuitClosed => "queue.circuit-closed",
            QueueEvent::RedisError => "queue.redis-error",
        }
    }

    fn level(&self) -> Level {
        match self {
            QueueEvent::Failed | QueueEvent::RedisError => Level::Error,
            QueueEvent::Retrying | QueueEvent::CircuitOpen => Level::Warn,
            _ => Level::Info,
        }
    }
}
