/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Session state machine (§4.1):
//!
//! ```text
//! Greeted --(EHLO)--> Ready
//! Ready --(MAIL FROM)--> HaveSender
//! HaveSender --(RCPT TO, repeatable)--> HaveRecipient
//! HaveRecipient --(DATA)--> ReceivingData
//! ReceivingData --(final ".")--> Ready
//! * --(STARTTLS, in Ready)--> TLS negotiation --> Greeted (fresh EHLO required)
//! * --(AUTH, submission only, in Ready)--> authenticated=true
//! ```
//!
//! This module only drives the state transitions and produces the reply to
//! send; command I/O, TLS handshakes, and the final-dot DATA reader live in
//! the listener.

use std::net::IpAddr;

use crate::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Greeted,
    Ready,
    HaveSender,
    HaveRecipient,
    ReceivingData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// SMTP 500/501 (§7 Protocol syntax error).
    Syntax,
    /// SMTP 503 (§7 Protocol sequence error).
    Sequence,
    /// SMTP 535 (§7 Authentication failure).
    AuthFailed,
    /// SMTP 538 5.7.11 (encryption required before AUTH).
    EncryptionRequired,
    /// SMTP 450/550 (§7 Policy denial).
    PolicyDenied,
    /// SMTP 552 5.2.2 (§7 Quota exceeded).
    QuotaExceeded,
    /// SMTP 451 4.3.0 (§7 Backend transient).
    Transient,
    /// SMTP 421 4.7.0, connection closed (§4.1 bad-command limit).
    TooManyErrors,
}

pub struct Session {
    pub profile: Profile,
    pub client_ip: IpAddr,
    pub state: State,
    pub authenticated_user_id: Option<i64>,
    pub tls_active: bool,
    pub sender: Option<String>,
    pub recipients: Vec<String>,
    pub bad_commands: usize,
    pub max_recipients: usize,
    pub max_bad_commands: usize,
}

impl Session {
    pub fn new(profile: Profile, client_ip: IpAddr, max_recipients: usize, max_bad_commands: usize) -> Self {
        Session {
            profile,
            client_ip,
            state: State::Greeted,
            authenticated_user_id: None,
            tls_active: false,
            sender: None,
            recipients: Vec::new(),
            bad_commands: 0,
            max_recipients,
            max_bad_commands,
        }
    }

    /// `true` once the submission policy's AUTH requirement (§4.1: "AUTH
    /// required before MAIL FROM when `require_tls` is set or always when
    /// not on localhost") is satisfied for this session.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated_user_id.is_some()
    }

    /// Records a protocol-level error and returns `Err(TooManyErrors)` once
    /// `max_bad_commands` is exceeded (§4.1, §7).
    pub fn record_bad_command(&mut self) -> Result<(), SessionError> {
        self.bad_commands += 1;
        if self.bad_commands > self.max_bad_commands {
            Err(SessionError::TooManyErrors)
        } else {
            Ok(())
        }
    }

    pub fn on_ehlo(&mut self) -> Result<(), SessionError> {
        match self.state {
            State::Greeted | State::Ready | State::HaveSender | State::HaveRecipient => {
                self.state = State::Ready;
                self.sender = None;
                self.recipients.clear();
                Ok(())
            }
            State::ReceivingData => Err(SessionError::Sequence),
        }
    }

    pub fn on_starttls(&mut self) -> Result<(), SessionError> {
        if self.state != State::Ready || self.tls_active {
            return Err(SessionError::Sequence);
        }
        self.tls_active = true;
        // A fresh EHLO is required after STARTTLS (§4.1).
        self.state = State::Greeted;
        Ok(())
    }

    pub fn on_auth_success(&mut self, user_id: i64) -> Result<(), SessionError> {
        if self.profile != Profile::Submission || self.state != State::Ready {
            return Err(SessionError::Sequence);
        }
        self.authenticated_user_id = Some(user_id);
        Ok(())
    }

    /// `require_tls_submission` enforcement (§4.1 submission policy): AUTH
    /// on cleartext 587 without STARTTLS is forbidden unless disabled.
    pub fn auth_allowed(&self, require_tls: bool) -> bool {
        self.profile == Profile::Submission && (self.tls_active || !require_tls)
    }

    pub fn on_mail_from(&mut self, address: String) -> Result<(), SessionError> {
        if self.state != State::Ready {
            return Err(SessionError::Sequence);
        }
        if address.is_empty() && !self.profile.allows_empty_mail_from() {
            return Err(SessionError::PolicyDenied);
        }
        if self.profile == Profile::Submission && !self.is_authenticated() {
            return Err(SessionError::AuthFailed);
        }
        self.sender = Some(address);
        self.state = State::HaveSender;
        Ok(())
    }

    pub fn on_rcpt_to(&mut self, address: String) -> Result<(), SessionError> {
        match self.state {
            State::HaveSender | State::HaveRecipient => {}
            _ => return Err(SessionError::Sequence),
        }
        if self.recipients.len() >= self.max_recipients {
            return Err(SessionError::PolicyDenied);
        }
        self.recipients.push(address);
        self.state = State::HaveRecipient;
        Ok(())
    }

    pub fn on_data_start(&mut self) -> Result<(), SessionError> {
        if self.state != State::HaveRecipient {
            return Err(SessionError::Sequence);
        }
        self.state = State::ReceivingData;
        Ok(())
    }

    /// Final dot: whatever the ingress pipeline decided, the session
    /// returns to `Ready` either way (§4.1).
    pub fn on_data_complete(&mut self) -> (String, Vec<String>) {
        self.state = State::Ready;
        let sender = self.sender.take().unwrap_or_default();
        let recipients = std::mem::take(&mut self.recipients);
        (sender, recipients)
    }

    pub fn on_rset(&mut self) {
        self.sender = None;
        self.recipients.clear();
        if self.state != State::Greeted {
            self.state = State::Ready;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn mx_session() -> Session {
        Session::new(Profile::Mx, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 100, 10)
    }

    fn submission_session() -> Session {
        Session::new(Profile::Submission, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 100, 10)
    }

    #[test]
    fn full_mx_happy_path() {
        let mut s = mx_session();
        s.on_ehlo().unwrap();
        s.on_mail_from("alice@ext.example".into()).unwrap();
        s.on_rcpt_to("bob@example.com".into()).unwrap();
        s.on_data_start().unwrap();
        let (sender, rcpts) = s.on_data_complete();
        assert_eq!(sender, "alice@ext.example");
        assert_eq!(rcpts, vec!["bob@example.com".to_string()]);
        assert_eq!(s.state, State::Ready);
    }

    #[test]
    fn mx_allows_null_sender() {
        let mut s = mx_session();
        s.on_ehlo().unwrap();
        assert!(s.on_mail_from(String::new()).is_ok());
    }

    #[test]
    fn submission_requires_auth_before_mail_from() {
        let mut s = submission_session();
        s.on_ehlo().unwrap();
        assert_eq!(s.on_mail_from("alice@example.com".into()), Err(SessionError::AuthFailed));
    }

    #[test]
    fn submission_after_auth_accepts_mail_from() {
        let mut s = submission_session();
        s.on_ehlo().unwrap();
        s.on_auth_success(42).unwrap();
        assert!(s.on_mail_from("alice@example.com".into()).is_ok());
    }

    #[test]
    fn rcpt_before_mail_from_is_sequence_error() {
        let mut s = mx_session();
        s.on_ehlo().unwrap();
        assert_eq!(s.on_rcpt_to("bob@example.com".into()), Err(SessionError::Sequence));
    }

    #[test]
    fn starttls_requires_fresh_ehlo() {
        let mut s = mx_session();
        s.on_ehlo().unwrap();
        s.on_starttls().unwrap();
        assert_eq!(s.state, State::Greeted);
        assert_eq!(s.on_mail_from("x@y".into()), Err(SessionError::Sequence));
        s.on_ehlo().unwrap();
        assert!(s.on_mail_from(String::new()).is_ok());
    }

    #[test]
    fn recipient_limit_enforced() {
        let mut s = mx_session();
        s.max_recipients = 2;
        s.on_ehlo().unwrap();
        s.on_mail_from(String::new()).unwrap();
        s.on_rcpt_to("a@example.com".into()).unwrap();
        s.on_rcpt_to("b@example.com".into()).unwrap();
        assert_eq!(s.on_rcpt_to("c@example.com".into()), Err(SessionError::PolicyDenied));
    }

    #[test]
    fn too_many_bad_commands_closes_session() {
        let mut s = mx_session();
        s.max_bad_commands = 2;
        assert!(s.record_bad_command().is_ok());
        assert!(s.record_bad_command().is_ok());
        assert_eq!(s.record_bad_command(), Err(SessionError::TooManyErrors));
    }

    #[test]
    fn cleartext_auth_forbidden_when_tls_required() {
        let s = submission_session();
        assert!(!s.auth_allowed(true));
        let mut s = submission_session();
        s.tls_active = true;
        assert!(s.auth_allowed(true));
        let s2 = submission_session();
        assert!(s2.auth_allowed(false));
    }
}
