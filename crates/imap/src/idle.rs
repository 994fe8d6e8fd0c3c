/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Per-mailbox IDLE pub-sub (§4.3): `AppendMessage`/flag-change/expunge
//! events are published here; sessions currently in `IDLE` subscribe and
//! translate incoming events into untagged `EXISTS`/`FETCH`/`EXPUNGE`
//! responses until the client sends `DONE` or the 29-minute timer fires.

use dashmap::DashMap;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum UpdateKind {
    Exists { message_count: u32 },
    FlagsChanged { uid: u32, flags: u32 },
    Expunge { uid: u32 },
}

#[derive(Debug, Clone)]
pub struct Update {
    pub mailbox_id: i64,
    pub kind: UpdateKind,
}

#[derive(Default)]
pub struct IdleRegistry {
    channels: DashMap<i64, broadcast::Sender<Update>>,
}

impl IdleRegistry {
    pub fn new() -> Self {
        IdleRegistry::default()
    }

    fn sender(&self, mailbox_id: i64) -> broadcast::Sender<Update> {
        self.channels
            .entry(mailbox_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub fn publish(&self, update: Update) {
        // No subscribers is not an error: the mailbox simply has nobody
        // idling on it right now.
        let _ = self.sender(update.mailbox_id).send(update);
    }

    pub fn subscribe(&self, mailbox_id: i64) -> broadcast::Receiver<Update> {
        self.sender(mailbox_id).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let registry = IdleRegistry::new();
        let mut rx = registry.subscribe(1);
        registry.publish(Update { mailbox_id: 1, kind: UpdateKind::Exists { message_count: 5 } });
        let update = rx.recv().await.unwrap();
        assert_eq!(update.mailbox_id, 1);
        assert!(matches!(update.kind, UpdateKind::Exists { message_count: 5 }));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let registry = IdleRegistry::new();
        registry.publish(Update { mailbox_id: 2, kind: UpdateKind::Expunge { uid: 1 } });
    }
}
