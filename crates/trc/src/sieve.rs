/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::{EventType, Level};

/// Events raised by the Sieve parser/evaluator (C6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SieveEvent {
    ScriptActivated,
    ScriptRejected,
    ParseError,
    ActionFileinto,
    ActionRedirect,
    ActionDiscard,
    ActionReject,
    ActionVacation,
    Evaluated,
}

impl EventType for SieveEvent {
    fn name(&self) -> &'static str {
        match self {
            SieveEvent::ScriptActivated => "sieve.script-activated",
            SieveEvent::ScriptRejected => "sieve.script-rejected",
            SieveEvent::ParseError => "sieve.parse-error",
            SieveEvent::ActionFileinto => "sieve.action-fileinto",
            SieveEvent::ActionRedirect => "sieve.action-redirect",
            SieveEvent::ActionDiscard => "sieve.action-discard",
            SieveEvent::ActionReject => "sieve.action-reject",
            SieveEvent::ActionVacation => "sieve.action-vacation",
            SieveEvent::Evaluated => "sieve.evaluated",
        }
    }

    fn level(&self) -> Level {
        match self {
            SieveEvent::ScriptRejected | SieveEvent::ParseError => Level::Warn,
            _ => Level::Info,
        }
    }
}
