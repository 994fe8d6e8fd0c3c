/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! SMTP dual-role engine (C1) and Ingress Pipeline (C2), plus the Outbound
//! Delivery Queue (C5). One command parser and one session state machine
//! serve both the MX listener (port 25, no auth) and the submission
//! listener (587/465, mandatory auth) — [`profile::Profile`] is the only
//! policy fork.

pub mod command;
pub mod headers;
pub mod ingress;
pub mod listener;
pub mod profile;
pub mod queue;
pub mod session;

pub use command::{parse_line, Command, CommandError};
pub use ingress::{DeliveryResult, Ingress, IngressError};
pub use listener::ListenerConfig;
pub use profile::Profile;
pub use session::{Session, SessionError, State};
