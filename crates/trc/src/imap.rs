/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::{EventType, Level};

/// Events raised by the IMAP session engine (C4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImapEvent {
    ConnectionStart,
    ConnectionEnd,
    Login,
    LoginFailed,
    Select,
    Fetch,
    Store,
    Search,
    Copy,
    Append,
    Expunge,
    IdleStart,
    IdleEnd,
    Error,
}

impl EventType for ImapEvent {
    fn name(&self) -> &'static str {
        match self {
            ImapEvent::ConnectionStart => "imap.connection-start",
            ImapEvent::ConnectionEnd => "imap.connection-end",
            ImapEvent::Login => "imap.login",
            ImapEvent::LoginFailed => "imap.login-failed",
            ImapEvent::Select => "imap.select",
            ImapEvent::Fetch => "imap.fetch",
            ImapEvent::Store => "imap.store",
            ImapEvent::Search => "imap.search",
            ImapEvent::Copy => "imap.copy",
            ImapEvent::Append => "imap.append",
            ImapEvent::Expunge => "imap.expunge",
            ImapEvent::IdleStart => "imap.idle-start",
            ImapEvent::IdleEnd => "imap.idle-end",
            ImapEvent::Error => "imap.error",
        }
    }

    fn level(&self) -> Level {
        match self {
            ImapEvent::LoginFailed => Level::Warn,
            ImapEvent::Error => Level::Error,
            _ => Level::Info,
        }
    }
}
