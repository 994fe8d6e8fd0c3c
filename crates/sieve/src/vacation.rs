/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Vacation-reply rate limiting (§4.5): at most one auto-reply per
//! `(user, original_sender)` within the script's `:days` window, tracked in
//! the `vacation_responses` table `store` already owns.

use chrono::Utc;
use rusqlite::params;
use store::{Result, Store};
use utils::Deadline;

/// Returns `true` if a vacation reply to `original_sender` should be sent
/// (and records that it was sent) — `false` if one was already sent inside
/// the `days` window.
pub async fn should_reply(
    store: &Store,
    deadline: Deadline,
    user_id: i64,
    original_sender: &str,
    days: u32,
) -> Result<bool> {
    let original_sender = original_sender.to_lowercase();
    let days = days as i64;
    store
        .with_conn(deadline, move |conn| {
            let now = Utc::now();
            let last_sent: Option<String> = conn
                .query_row(
                    "SELECT last_sent_at FROM vacation_responses \
                     WHERE user_id = ?1 AND original_sender = ?2",
                    params![user_id, original_sender],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            if let Some(last_sent) = last_sent {
                let last_sent = chrono::DateTime::parse_from_rfc3339(&last_sent)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(now);
                if (now - last_sent).num_days() < days {
                    return Ok(false);
                }
            }

            conn.execute(
                "INSERT INTO vacation_responses (user_id, original_sender, last_sent_at) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT (user_id, original_sender) DO UPDATE SET last_sent_at = excluded.last_sent_at",
                params![user_id, original_sender, now.to_rfc3339()],
            )?;
            Ok(true)
        })
        .await
}
