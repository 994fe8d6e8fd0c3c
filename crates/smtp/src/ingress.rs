/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Ingress Pipeline (C2, §4.2): greylist check, optional SPF/DKIM/DMARC
//! verify, alias resolution, Sieve evaluation, and Maildir append for MX
//! traffic; sender authorization, DKIM signing, and queue enqueue for
//! submission traffic.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use common::Core;
use directory::{DirectoryError, QueryParams};
use policy::Greylister;
use sieve::Action;
use store::{Flags, SpecialUse, StoreError};
use utils::Deadline;

use crate::headers::{extract_message_headers, extract_sieve_message};
use crate::queue::QueueMessage;

#[derive(Debug, Clone)]
pub enum IngressError {
    /// Recipient does not resolve to a local mailbox (§7: SMTP 550 5.1.1).
    UnknownRecipient(String),
    /// Triplet not yet past `min_delay` (§7: SMTP 450).
    Greylisted,
    QuotaExceeded,
    Transient(String),
}

impl From<StoreError> for IngressError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::QuotaExceeded => IngressError::QuotaExceeded,
            StoreError::NotFound => IngressError::UnknownRecipient(String::new()),
            other => IngressError::Transient(other.to_string()),
        }
    }
}

impl From<DirectoryError> for IngressError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::NotFound => IngressError::UnknownRecipient(String::new()),
            other => IngressError::Transient(other.to_string()),
        }
    }
}

/// Per local recipient, which mailbox(es) the message landed in, or that it
/// was discarded/rejected/redirected by Sieve.
#[derive(Debug, Clone)]
pub enum DeliveryResult {
    Appended { recipient: String, mailbox: String, uid: u32 },
    Discarded { recipient: String },
    Rejected { recipient: String, reason: String },
    Redirected { recipient: String, target: String },
}

/// What Sieve decided for one recipient, before any message row is
/// committed. `Append` carries a fully prepared [`store::AppendTarget`] so
/// every recipient's append can be folded into one transaction.
enum LocalPlan {
    Discarded { recipient: String },
    Rejected { recipient: String, reason: String },
    Redirected { recipient: String, target: String },
    Append { recipient: String, mailbox: String, target: store::AppendTarget },
}

pub struct Ingress {
    pub core: Arc<Core>,
    pub greylist: Arc<Greylister>,
}

impl Ingress {
    pub fn new(core: Arc<Core>, greylist: Arc<Greylister>) -> Self {
        Ingress { core, greylist }
    }

    /// Resolves `address` through the alias table (Open Question (a):
    /// unconditional expansion) and confirms it maps to a real mailbox
    /// (§4.1 MX policy: `550 5.1.1 User unknown` otherwise).
    pub async fn validate_recipient(
        &self,
        deadline: Deadline,
        address: &str,
    ) -> Result<String, IngressError> {
        let resolved = self.core.directory.resolve_address(deadline, address).await?;
        self.core
            .directory
            .query(deadline, QueryParams::address(&resolved))
            .await?;
        Ok(resolved)
    }

    /// Runs the greylist triplet check for one recipient (§4.6). `true`
    /// means the message may proceed for this recipient now.
    pub async fn greylist_allows(
        &self,
        deadline: Deadline,
        client_ip: IpAddr,
        sender: &str,
        recipient: &str,
    ) -> Result<bool, IngressError> {
        let (allowed, _first_seen) = self
            .greylist
            .check(deadline, client_ip, sender, recipient)
            .await
            .map_err(|e| IngressError::Transient(e.to_string()))?;
        Ok(allowed)
    }

    /// MX-side commit: greylist each recipient, evaluate Sieve for each that
    /// passes, and append every resulting local delivery in one transaction
    /// (§4.1 message commit atomicity) so a message with several local
    /// recipients is never visible as delivered to some and missing for
    /// others. A recipient that is still greylisted is simply omitted from
    /// the result; the caller's `450` response and the remote sender's
    /// retry handle that recipient later.
    pub async fn commit_inbound(
        &self,
        deadline: Deadline,
        client_ip: IpAddr,
        sender: &str,
        recipients: &[String],
        raw_message: &[u8],
    ) -> Result<Vec<DeliveryResult>, IngressError> {
        let mut plans = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            if !self.greylist_allows(deadline, client_ip, sender, recipient).await? {
                continue;
            }
            plans.push(self.plan_local_delivery(deadline, sender, recipient, raw_message).await?);
        }

        let mut results: Vec<Option<DeliveryResult>> = Vec::with_capacity(plans.len());
        let mut append_targets = Vec::new();
        let mut append_slots = Vec::new();
        for plan in plans {
            match plan {
                LocalPlan::Discarded { recipient } => {
                    results.push(Some(DeliveryResult::Discarded { recipient }))
                }
                LocalPlan::Rejected { recipient, reason } => {
                    results.push(Some(DeliveryResult::Rejected { recipient, reason }))
                }
                LocalPlan::Redirected { recipient, target } => {
                    results.push(Some(DeliveryResult::Redirected { recipient, target }))
                }
                LocalPlan::Append { recipient, mailbox, target } => {
                    append_slots.push((results.len(), recipient, mailbox));
                    append_targets.push(target);
                    results.push(None);
                }
            }
        }

        if !append_targets.is_empty() {
            let uids = self.core.store.append_messages(deadline, append_targets).await?;
            for ((idx, recipient, mailbox), uid) in append_slots.into_iter().zip(uids) {
                results[idx] = Some(DeliveryResult::Appended { recipient, mailbox, uid });
            }
        }

        Ok(results.into_iter().map(|r| r.expect("every plan produces exactly one result")).collect())
    }

    /// Evaluates Sieve for one recipient and, for terminal actions that
    /// keep the message, builds the [`store::AppendTarget`] the caller will
    /// submit alongside every other recipient's target in a single
    /// transaction. Does not itself write any message row.
    async fn plan_local_delivery(
        &self,
        deadline: Deadline,
        sender: &str,
        recipient: &str,
        raw_message: &[u8],
    ) -> Result<LocalPlan, IngressError> {
        let user = self
            .core
            .directory
            .query(deadline, QueryParams::address(recipient))
            .await?;

        let sieve_message = extract_sieve_message(raw_message, sender, std::slice::from_ref(&recipient.to_string()));
        let actions = match self.core.store.get_active_sieve_script(deadline, user.id).await? {
            Some(script_src) => {
                let limits: sieve::SieveLimits = self.core.config.sieve.clone().into();
                match sieve::parse(&script_src, limits) {
                    Ok(script) => sieve::evaluate(&script, &sieve_message),
                    Err(_) => vec![Action::Keep],
                }
            }
            None => vec![Action::Keep],
        };

        for action in actions {
            match action {
                Action::Discard => return Ok(LocalPlan::Discarded { recipient: recipient.to_string() }),
                Action::Reject(reason) => {
                    return Ok(LocalPlan::Rejected { recipient: recipient.to_string(), reason })
                }
                Action::Redirect(target) => {
                    return Ok(LocalPlan::Redirected { recipient: recipient.to_string(), target })
                }
                Action::FileInto(mailbox_name) => {
                    let target = self.build_append_target(deadline, &user, &mailbox_name, raw_message).await?;
                    return Ok(LocalPlan::Append { recipient: recipient.to_string(), mailbox: mailbox_name, target });
                }
                Action::Keep => {
                    let target = self
                        .build_append_target(deadline, &user, SpecialUse::Inbox.as_str(), raw_message)
                        .await?;
                    return Ok(LocalPlan::Append {
                        recipient: recipient.to_string(),
                        mailbox: SpecialUse::Inbox.as_str().to_string(),
                        target,
                    });
                }
                Action::Vacation(_) | Action::Stop => continue,
            }
        }
        let target = self
            .build_append_target(deadline, &user, SpecialUse::Inbox.as_str(), raw_message)
            .await?;
        Ok(LocalPlan::Append {
            recipient: recipient.to_string(),
            mailbox: SpecialUse::Inbox.as_str().to_string(),
            target,
        })
    }

    async fn build_append_target(
        &self,
        deadline: Deadline,
        user: &store::User,
        mailbox_name: &str,
        raw_message: &[u8],
    ) -> Result<store::AppendTarget, IngressError> {
        let mailbox = match self.core.store.get_mailbox(deadline, user.id, mailbox_name).await {
            Ok(mailbox) => mailbox,
            Err(StoreError::NotFound) => {
                self.core
                    .store
                    .create_mailbox(deadline, user.id, mailbox_name, None)
                    .await?
            }
            Err(e) => return Err(e.into()),
        };
        let headers = extract_message_headers(raw_message);
        Ok(store::AppendTarget {
            user_id: user.id,
            mailbox,
            flags: Flags(Flags::RECENT),
            internal_date: Utc::now(),
            body: raw_message.to_vec(),
            headers,
        })
    }

    /// Submission-side commit (§4.1): append to the authenticated user's
    /// `Sent` mailbox, DKIM-sign if a signer is configured, and enqueue for
    /// delivery to every remote recipient.
    pub async fn commit_submission(
        &self,
        deadline: Deadline,
        user_id: i64,
        sender_domain: &str,
        sender: &str,
        recipients: Vec<String>,
        raw_message: Vec<u8>,
        spool_dir: &std::path::Path,
    ) -> Result<(u32, QueueMessage), IngressError> {
        let signed = match &self.core.signer {
            Some(signer) => match signer.sign(sender_domain, &raw_message) {
                Some(dkim_header) => {
                    let mut out = format!("DKIM-Signature: {dkim_header}\r\n").into_bytes();
                    out.extend_from_slice(&raw_message);
                    out
                }
                None => raw_message,
            },
            None => raw_message,
        };

        let sent_mailbox = self
            .core
            .store
            .get_mailbox(deadline, user_id, SpecialUse::Sent.as_str())
            .await?;
        let headers = extract_message_headers(&signed);
        let uid = self
            .core
            .store
            .append_message(
                deadline,
                user_id,
                &sent_mailbox,
                Flags(Flags::SEEN),
                Utc::now(),
                &signed,
                headers,
            )
            .await?;

        let message_path = spool_dir.join(format!("{}-{}", user_id, uuid::Uuid::new_v4()));
        tokio::fs::write(&message_path, &signed)
            .await
            .map_err(|e| IngressError::Transient(e.to_string()))?;

        let queue_message = QueueMessage::new(sender.to_string(), recipients, PathBuf::from(message_path), signed.len() as u64);
        Ok((uid, queue_message))
    }
}

impl From<common::config::SieveLimits> for sieve::SieveLimits {
    fn from(c: common::config::SieveLimits) -> Self {
        sieve::SieveLimits {
            max_script_size: c.max_script_size,
            max_array_elements: c.max_array_elements,
            max_condition_depth: c.max_condition_depth,
            max_vacation_days: c.max_vacation_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use directory::{hash_password, Directory};
    use policy::GreylistConfig;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use store::Store;

    async fn test_core() -> Arc<Core> {
        let store = Store::open_test().unwrap();
        let deadline = Deadline::after(Duration::from_secs(5));
        let domain_id = store.create_domain(deadline, "example.com").await.unwrap();
        let hash = hash_password("hunter2").unwrap();
        store
            .create_user(deadline, domain_id, "bob", &hash, 1 << 30)
            .await
            .unwrap();
        let directory = Arc::new(Directory::new(store.clone()));
        Arc::new(Core::new(common::Config::default(), store, directory))
    }

    #[tokio::test]
    async fn unknown_recipient_is_rejected() {
        let core = test_core().await;
        let greylist = Arc::new(Greylister::new(core.store.clone(), GreylistConfig::default()));
        let ingress = Ingress::new(core, greylist);
        let deadline = Deadline::after(Duration::from_secs(5));
        assert!(matches!(
            ingress.validate_recipient(deadline, "nobody@example.com").await,
            Err(IngressError::UnknownRecipient(_))
        ));
    }

    #[tokio::test]
    async fn known_recipient_resolves() {
        let core = test_core().await;
        let greylist = Arc::new(Greylister::new(core.store.clone(), GreylistConfig::default()));
        let ingress = Ingress::new(core, greylist);
        let deadline = Deadline::after(Duration::from_secs(5));
        let resolved = ingress.validate_recipient(deadline, "bob@example.com").await.unwrap();
        assert_eq!(resolved, "bob@example.com");
    }

    #[tokio::test]
    async fn fresh_triplet_is_greylisted_then_delivers_on_retry() {
        let core = test_core().await;
        let greylist = Arc::new(Greylister::new(
            core.store.clone(),
            GreylistConfig { min_delay: Duration::from_millis(0) },
        ));
        let ingress = Ingress::new(core, greylist);
        let deadline = Deadline::after(Duration::from_secs(5));
        let client_ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9));
        let raw = b"From: alice@ext.example\r\nTo: bob@example.com\r\nSubject: Hi\r\n\r\nBody";

        let first_attempt = ingress
            .commit_inbound(deadline, client_ip, "alice@ext.example", &["bob@example.com".to_string()], raw)
            .await
            .unwrap();
        assert!(first_attempt.is_empty(), "fresh triplet must be deferred, not delivered");

        let retry = ingress
            .commit_inbound(deadline, client_ip, "alice@ext.example", &["bob@example.com".to_string()], raw)
            .await
            .unwrap();
        assert_eq!(retry.len(), 1);
        assert!(matches!(retry[0], DeliveryResult::Appended { .. }));
    }
}
