/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Structured event/error plumbing shared by every crate in the workspace.
//!
//! Where the bytes produced here end up (stdout, a file, an OTLP collector)
//! is an external collaborator's problem; this crate only defines the typed
//! vocabulary of events and a minimal in-process `Collector` sink used by
//! tests.

use std::{fmt, sync::Arc};

use ahash::AHashMap;
use parking_lot::Mutex;

pub mod smtp;
pub mod imap;
pub mod store;
pub mod queue;
pub mod sieve;
pub mod policy;

pub use smtp::SmtpEvent;
pub use imap::ImapEvent;
pub use store::StoreEvent;
pub use queue::QueueEvent;
pub use sieve::SieveEvent;
pub use policy::PolicyEvent;

/// Severity associated with an event, independent of which wire-level code
/// it eventually surfaces as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// A context key attached to an event for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    AccountId,
    MailboxId,
    Uid,
    RemoteIp,
    Domain,
    Reason,
    Code,
    Attempts,
    MessageId,
}

#[derive(Debug, Clone)]
pub enum Value {
    UInt(u64),
    Int(i64),
    String(String),
    Bool(bool),
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v as u64)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// A typed, loggable error produced from one of the per-component event
/// enums. Carries enough context to both drive a protocol response and be
/// emitted as a structured log line.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: &'static str,
    pub level: Level,
    pub details: Option<String>,
    pub ctx: Vec<(Key, Value)>,
}

impl Error {
    pub fn new(kind: &'static str, level: Level) -> Self {
        Error {
            kind,
            level,
            details: None,
            ctx: Vec::new(),
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn reason(mut self, reason: impl fmt::Display) -> Self {
        self.details = Some(reason.to_string());
        self
    }

    pub fn ctx(mut self, key: Key, value: impl Into<Value>) -> Self {
        self.ctx.push((key, value));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(details) = &self.details {
            write!(f, ": {details}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

/// Implemented by every per-component event enum so it can be turned into
/// a loggable/returnable `Error` with a single call.
pub trait EventType: Copy {
    fn name(&self) -> &'static str;
    fn level(&self) -> Level;

    #[inline]
    fn into_err(self) -> Error {
        Error::new(self.name(), self.level())
    }
}

/// Sink for emitted events. Production wiring (OTLP, file, journald) lives
/// outside this crate; tests and the in-process server use `MemoryCollector`.
pub trait Collector: Send + Sync {
    fn record(&self, event: Error);
}

#[derive(Default, Clone)]
pub struct MemoryCollector {
    events: Arc<Mutex<Vec<Error>>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Error> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Collector for MemoryCollector {
    fn record(&self, event: Error) {
        self.events.lock().push(event);
    }
}

/// Counts of context key/value occurrences, useful for assertions in tests.
pub fn ctx_value(err: &Error, key: Key) -> Option<&Value> {
    err.ctx.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
}

#[derive(Default, Clone)]
pub struct NullCollector;

impl Collector for NullCollector {
    fn record(&self, _event: Error) {}
}

/// Convenience map used by components that want to tag events with
/// connection-scoped context (span-equivalent) without pulling in a full
/// tracing subscriber.
pub type Fields = AHashMap<Key, Value>;
