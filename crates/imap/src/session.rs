/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! IMAP session state machine (§4.3):
//!
//! ```text
//! NotAuthenticated --(LOGIN)--> Authenticated
//! Authenticated --(SELECT/EXAMINE)--> Selected(mailbox)
//! Selected --(CLOSE/UNSELECT)--> Authenticated
//! * --(LOGOUT)--> Logout
//! ```
//!
//! A selected mailbox carries its own UID↔sequence snapshot, taken at
//! selection time, so that EXPUNGEs delivered by other sessions never shift
//! sequence numbers this session has already reported (§4.3 Concurrency).

use store::Mailbox;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    NotAuthenticated,
    Authenticated,
    Selected,
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    Syntax,
    Sequence,
    AuthFailed,
    PolicyDenied,
    QuotaExceeded,
    Transient,
}

/// Snapshot of a selected mailbox's UID ordering at `SELECT` time. FETCH and
/// STORE resolve client-supplied sequence numbers through this list rather
/// than re-querying live order, so that an EXPUNGE mid-session (by another
/// session on the same mailbox) cannot silently renumber what "sequence 3"
/// refers to until this session re-selects.
#[derive(Debug, Clone, Default)]
pub struct MailboxSnapshot {
    /// UIDs ordered ascending; index + 1 is the IMAP sequence number.
    pub uids: Vec<u32>,
}

impl MailboxSnapshot {
    pub fn new(uids: Vec<u32>) -> Self {
        MailboxSnapshot { uids }
    }

    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    pub fn seq_to_uid(&self, seq: u32) -> Option<u32> {
        self.uids.get(seq.checked_sub(1)? as usize).copied()
    }

    pub fn uid_to_seq(&self, uid: u32) -> Option<u32> {
        self.uids.iter().position(|&u| u == uid).map(|i| (i + 1) as u32)
    }

    /// Removes expunged UIDs and returns their descending sequence numbers,
    /// the order IMAP's untagged `EXPUNGE` responses must be sent in.
    pub fn apply_expunge(&mut self, expunged_uids: &[u32]) -> Vec<u32> {
        let mut seqs: Vec<u32> = expunged_uids.iter().filter_map(|u| self.uid_to_seq(*u)).collect();
        seqs.sort_unstable_by(|a, b| b.cmp(a));
        for &uid in expunged_uids {
            self.uids.retain(|u| *u != uid);
        }
        seqs
    }
}

pub struct Session {
    pub state: State,
    pub user_id: Option<i64>,
    pub selected_mailbox: Option<Mailbox>,
    pub snapshot: MailboxSnapshot,
    pub read_only: bool,
    pub idling: bool,
    pub tls_active: bool,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            state: State::NotAuthenticated,
            user_id: None,
            selected_mailbox: None,
            snapshot: MailboxSnapshot::default(),
            read_only: false,
            idling: false,
            tls_active: false,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    /// `STARTTLS` is only valid before authentication and only once per
    /// connection (RFC 3501 §6.2.1).
    pub fn on_starttls(&mut self) -> Result<(), SessionError> {
        if self.state != State::NotAuthenticated || self.tls_active {
            return Err(SessionError::Sequence);
        }
        self.tls_active = true;
        Ok(())
    }

    pub fn on_login(&mut self, user_id: i64) -> Result<(), SessionError> {
        if self.state != State::NotAuthenticated {
            return Err(SessionError::Sequence);
        }
        self.user_id = Some(user_id);
        self.state = State::Authenticated;
        Ok(())
    }

    pub fn on_select(&mut self, mailbox: Mailbox, uids: Vec<u32>, read_only: bool) -> Result<(), SessionError> {
        if self.state != State::Authenticated && self.state != State::Selected {
            return Err(SessionError::Sequence);
        }
        self.selected_mailbox = Some(mailbox);
        self.snapshot = MailboxSnapshot::new(uids);
        self.read_only = read_only;
        self.state = State::Selected;
        self.idling = false;
        Ok(())
    }

    pub fn on_close(&mut self) -> Result<(), SessionError> {
        if self.state != State::Selected {
            return Err(SessionError::Sequence);
        }
        self.selected_mailbox = None;
        self.snapshot = MailboxSnapshot::default();
        self.state = State::Authenticated;
        Ok(())
    }

    pub fn on_logout(&mut self) {
        self.state = State::Logout;
        self.selected_mailbox = None;
    }

    pub fn require_selected(&self) -> Result<&Mailbox, SessionError> {
        if self.state != State::Selected {
            return Err(SessionError::Sequence);
        }
        self.selected_mailbox.as_ref().ok_or(SessionError::Sequence)
    }

    pub fn require_authenticated(&self) -> Result<i64, SessionError> {
        self.user_id.ok_or(SessionError::AuthFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::SpecialUse;

    fn mailbox() -> Mailbox {
        Mailbox { id: 1, user_id: 1, name: "INBOX".into(), uid_validity: 1, uid_next: 1, subscribed: true, special_use: SpecialUse::Inbox }
    }

    #[test]
    fn login_then_select_then_close() {
        let mut s = Session::new();
        s.on_login(1).unwrap();
        assert_eq!(s.state, State::Authenticated);
        s.on_select(mailbox(), vec![1, 2, 3], false).unwrap();
        assert_eq!(s.state, State::Selected);
        s.on_close().unwrap();
        assert_eq!(s.state, State::Authenticated);
    }

    #[test]
    fn select_before_login_is_sequence_error() {
        let mut s = Session::new();
        assert_eq!(s.on_select(mailbox(), vec![], false), Err(SessionError::Sequence));
    }

    #[test]
    fn snapshot_translates_and_expunges() {
        let mut snap = MailboxSnapshot::new(vec![10, 20, 30, 40]);
        assert_eq!(snap.seq_to_uid(2), Some(20));
        assert_eq!(snap.uid_to_seq(30), Some(3));
        let expunged = snap.apply_expunge(&[20, 40]);
        assert_eq!(expunged, vec![4, 2]);
        assert_eq!(snap.uids, vec![10, 30]);
    }
}
