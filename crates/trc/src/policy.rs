/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::{EventType, Level};

/// Events raised by the policy kernel (C7): greylisting, auth rate
/// limiting, circuit breaker state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyEvent {
    GreylistNew,
    GreylistPassed,
    GreylistDeferred,
    AuthBlocked,
    AuthUnblocked,
    CircuitOpened,
    CircuitHalfOpened,
    CircuitClosed,
}

impl EventType for PolicyEvent {
    fn name(&self) -> &'static str {
        match self {
            PolicyEvent::GreylistNew => "policy.greylist-new",
            PolicyEvent::GreylistPassed => "policy.greylist-passed",
            PolicyEvent::GreylistDeferred => "policy.greylist-deferred",
            PolicyEvent::AuthBlocked => "policy.auth-blocked",
            PolicyEvent::AuthUnblocked => "policy.auth-unblocked",
            PolicyEvent::CircuitOpened => "policy.circuit-opened",
            PolicyEvent::CircuitHalfOpened => "policy.circuit-half-opened",
            PolicyEvent::CircuitClosed => "policy.circuit-closed",
        }
    }

    fn level(&self) -> Level {
        match self {
            PolicyEvent::AuthBlocked | PolicyEvent::CircuitOpened => Level::Warn,
            _ => Level::Info,
        }
    }
}
