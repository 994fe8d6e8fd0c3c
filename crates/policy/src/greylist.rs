/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Greylist triplet tracking (§4.6): `(sender_ip_network, sender, recipient)`
//! is upserted in the `greylist` table owned by `store`; aging is handled by
//! `store::janitor`, not here.

use std::net::IpAddr;

use chrono::Utc;
use rusqlite::params;
use store::{Store, StoreError};
use utils::Deadline;

#[derive(Debug, Clone, Copy)]
pub struct GreylistConfig {
    pub min_delay: std::time::Duration,
}

impl Default for GreylistConfig {
    fn default() -> Self {
        GreylistConfig {
            min_delay: std::time::Duration::from_secs(5 * 60),
        }
    }
}

pub struct Greylister {
    store: Store,
    config: GreylistConfig,
}

/// `(allow, first_time)` — see §4.6 for the exact decision table.
pub type GreylistResult = (bool, bool);

impl Greylister {
    pub fn new(store: Store, config: GreylistConfig) -> Self {
        Greylister { store, config }
    }

    pub async fn check(
        &self,
        deadline: Deadline,
        client_ip: IpAddr,
        sender: &str,
        recipient: &str,
    ) -> Result<GreylistResult, StoreError> {
        let network = normalize_network(client_ip);
        let sender = sender.to_lowercase();
        let recipient = recipient.to_lowercase();
        let min_delay_secs = self.config.min_delay.as_secs() as i64;

        self.store
            .with_conn(deadline, move |conn| {
                let now = Utc::now();
                let existing: Option<(String, String, i64)> = conn
                    .query_row(
                        "SELECT first_seen, last_seen, passed FROM greylist \
                         WHERE sender_ip_network = ?1 AND sender_addr_lower = ?2 \
                         AND recipient_addr_lower = ?3",
                        params![network, sender, recipient],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;

                match existing {
                    None => {
                        conn.execute(
                            "INSERT INTO greylist (sender_ip_network, sender_addr_lower, \
                             recipient_addr_lower, first_seen, last_seen, passed) \
                             VALUES (?1, ?2, ?3, ?4, ?4, 0)",
                            params![network, sender, recipient, now.to_rfc3339()],
                        )?;
                        Ok((false, true))
                    }
                    Some((first_seen, _last_seen, passed)) => {
                        let first_seen = chrono::DateTime::parse_from_rfc3339(&first_seen)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or(now);
                        if passed != 0 {
                            conn.execute(
                                "UPDATE greylist SET last_seen = ?1 \
                                 WHERE sender_ip_network = ?2 AND sender_addr_lower = ?3 \
                                 AND recipient_addr_lower = ?4",
                                params![now.to_rfc3339(), network, sender, recipient],
                            )?;
                            Ok((true, false))
                        } else if (now - first_seen).num_seconds() >= min_delay_secs {
                            conn.execute(
                                "UPDATE greylist SET last_seen = ?1, passed = 1 \
                                 WHERE sender_ip_network = ?2 AND sender_addr_lower = ?3 \
                                 AND recipient_addr_lower = ?4",
                                params![now.to_rfc3339(), network, sender, recipient],
                            )?;
                            Ok((true, false))
                        } else {
                            conn.execute(
                                "UPDATE greylist SET last_seen = ?1 \
                                 WHERE sender_ip_network = ?2 AND sender_addr_lower = ?3 \
                                 AND recipient_addr_lower = ?4",
                                params![now.to_rfc3339(), network, sender, recipient],
                            )?;
                            Ok((false, false))
                        }
                    }
                }
            })
            .await
    }
}

/// IPv4 normalized to /24, IPv6 to /64 (§3 GreylistEntry).
fn normalize_network(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            format!("{}.{}.{}.0/24", octets[0], octets[1], octets[2])
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            format!(
                "{:x}:{:x}:{:x}:{:x}::/64",
                segments[0], segments[1], segments[2], segments[3]
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn ipv4_normalizes_to_slash_24() {
        let ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10));
        assert_eq!(normalize_network(ip), "192.0.2.0/24");
    }

    #[tokio::test]
    async fn fresh_triplet_then_pass_after_delay() {
        let store = Store::open_test().unwrap();
        let greylister = Greylister::new(
            store,
            GreylistConfig {
                min_delay: std::time::Duration::from_secs(0),
            },
        );
        let ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10));
        let deadline = Deadline::after(std::time::Duration::from_secs(5));
        let (allow, first_time) = greylister.check(deadline, ip, "a@x", "b@y").await.unwrap();
        assert!(!allow);
        assert!(first_time);
        let (allow, first_time) = greylister.check(deadline, ip, "a@x", "b@y").await.unwrap();
        assert!(allow);
        assert!(!first_time);
    }
}
