/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::Flags;

#[derive(Debug, Clone)]
pub struct Domain {
    pub id: i64,
    pub name: String,
    pub dkim_selector: Option<String>,
    pub dkim_key_ref: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub domain_id: i64,
    pub local_part: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub quota_bytes: i64,
    pub used_bytes: i64,
    pub is_admin: bool,
    pub active: bool,
}

impl User {
    pub fn address(&self, domain_name: &str) -> String {
        format!("{}@{}", self.local_part, domain_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialUse {
    Inbox,
    Sent,
    Drafts,
    Trash,
    Junk,
    Archive,
    None,
}

impl SpecialUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialUse::Inbox => "Inbox",
            SpecialUse::Sent => "Sent",
            SpecialUse::Drafts => "Drafts",
            SpecialUse::Trash => "Trash",
            SpecialUse::Junk => "Junk",
            SpecialUse::Archive => "Archive",
            SpecialUse::None => "none",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Inbox" => SpecialUse::Inbox,
            "Sent" => SpecialUse::Sent,
            "Drafts" => SpecialUse::Drafts,
            "Trash" => SpecialUse::Trash,
            "Junk" => SpecialUse::Junk,
            "Archive" => SpecialUse::Archive,
            _ => SpecialUse::None,
        }
    }

    /// The five mailboxes auto-created on first login (§3 Mailbox).
    pub const AUTO_CREATED: [SpecialUse; 5] = [
        SpecialUse::Inbox,
        SpecialUse::Sent,
        SpecialUse::Drafts,
        SpecialUse::Trash,
        SpecialUse::Junk,
    ];
}

#[derive(Debug, Clone)]
pub struct Mailbox {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub uid_validity: u32,
    pub uid_next: u32,
    pub subscribed: bool,
    pub special_use: SpecialUse,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub mailbox_id: i64,
    pub uid: u32,
    pub maildir_key: String,
    pub size: i64,
    pub internal_date: chrono::DateTime<chrono::Utc>,
    pub flags: Flags,
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub from_addr: Option<String>,
    pub to_list: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}

/// Envelope-ish header bundle the SMTP/Sieve callers extract before
/// `AppendMessage`; storage persists the already-extracted fields rather
/// than re-parsing MIME (full MIME parsing is a Non-goal).
#[derive(Debug, Clone, Default)]
pub struct MessageHeaders {
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub from_addr: Option<String>,
    pub to_list: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Alias {
    pub id: i64,
    pub domain_id: i64,
    pub source_local_part: String,
    pub target_address: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    pub before: Option<chrono::DateTime<chrono::Utc>>,
    pub larger: Option<i64>,
    pub smaller: Option<i64>,
    pub flags_present: Vec<u32>,
    pub flags_absent: Vec<u32>,
    pub from_contains: Option<String>,
    pub to_contains: Option<String>,
    pub subject_contains: Option<String>,
}
