/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Background maintenance loop: reaps orphaned `tmp/` files (§4.2) and ages
//! out stale greylist rows. Runs as a single `tokio::spawn`'d task owned by
//! the embedding process; cancellation is cooperative via the `stop` watch
//! channel rather than a deadline, since this is not a caller-facing
//! operation.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use trc::{store::StoreEvent, Collector, EventType, Key};
use utils::Deadline;

use crate::Store;

pub struct JanitorConfig {
    pub tmp_max_age: Duration,
    pub sweep_interval: Duration,
    pub greylist_max_age: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        JanitorConfig {
            tmp_max_age: Duration::from_secs(36 * 3600),
            sweep_interval: Duration::from_secs(15 * 60),
            greylist_max_age: Duration::from_secs(35 * 24 * 3600),
        }
    }
}

/// Spawns the janitor loop, returning a handle that stops it when `true` is
/// sent on the returned channel.
pub fn spawn(store: Store, config: JanitorConfig, collector: Arc<dyn Collector>) -> watch::Sender<bool> {
    let (tx, mut rx) = watch::channel(false);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(config.sweep_interval) => {}
                _ = rx.changed() => {
                    if *rx.borrow() {
                        break;
                    }
                }
            }

            match store.run_janitor(config.tmp_max_age).await {
                Ok(removed) if removed > 0 => {
                    collector.record(
                        StoreEvent::JanitorSwept
                            .into_err()
                            .ctx(Key::Attempts, removed as u64),
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    collector.record(StoreEvent::IoError.into_err().reason(e));
                }
            }

            if let Err(e) = prune_greylist(&store, config.greylist_max_age).await {
                collector.record(StoreEvent::SqlError.into_err().reason(e));
            }
        }
    });
    tx
}

async fn prune_greylist(store: &Store, max_age: Duration) -> crate::Result<()> {
    let cutoff = (chrono::Utc::now() - chrono::Duration::from_std(max_age).unwrap_or_default())
        .to_rfc3339();
    store
        .with_conn(Deadline::after(Duration::from_secs(30)), move |conn| {
            conn.execute("DELETE FROM greylist WHERE last_seen < ?1", [cutoff])?;
            Ok(())
        })
        .await
}
