/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::{EventType, Level};

/// Events raised by the SMTP dual-role engine (C1+C2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpEvent {
    ConnectionStart,
    ConnectionEnd,
    Ehlo,
    MailFrom,
    RcptTo,
    RcptNotFound,
    DataStart,
    DataTooLarge,
    MessageAccepted,
    MessageRejected,
    Greylisted,
    AuthFailed,
    AuthSuccess,
    TlsRequired,
    TooManyErrors,
    Error,
}

impl EventType for SmtpEvent {
    fn name(&self) -> &'static str {
        match self {
            SmtpEvent::ConnectionStart => "smtp.connection-start",
            SmtpEvent::ConnectionEnd => "smtp.connection-end",
            SmtpEvent::Ehlo => "smtp.ehlo",
            SmtpEvent::MailFrom => "smtp.mail-from",
            SmtpEvent::RcptTo => "smtp.rcpt-to",
            SmtpEvent::RcptNotFound => "smtp.rcpt-not-found",
            SmtpEvent::DataStart => "smtp.data-start",
            SmtpEvent::DataTooLarge => "smtp.data-too-large",
            SmtpEvent::MessageAccepted => "smtp.message-accepted",
            SmtpEvent::MessageRejected => "smtp.message-rejected",
            SmtpEvent::Greylisted => "smtp.greylisted",
            SmtpEvent::AuthFailed => "smtp.auth-failed",
            SmtpEvent::AuthSuccess => "smtp.auth-success",
            SmtpEvent::TlsRequired => "smtp.tls-required",
            SmtpEvent::TooManyErrors => "smtp.too-many-errors",
            SmtpEvent::Error => "smtp.error",
        }
    }

    fn level(&self) -> Level {
        match self {
            SmtpEvent::RcptNotFound
            | SmtpEvent::DataTooLarge
            | SmtpEvent::MessageRejected
            | SmtpEvent::Greylisted
            | SmtpEvent::AuthFailed
            | SmtpEvent::TlsRequired
            | SmtpEvent::TooManyErrors => Level::Warn,
            SmtpEvent::Error => Level::Error,
            _ => Level::Info,
        }
    }
}
