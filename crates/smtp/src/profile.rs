/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! MX vs Submission policy divergence (§4.1). One command parser and one
//! state machine drive both; the listener port picks a profile at accept
//! time and every policy branch below consults it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Port 25: no AUTH advertised, empty `MAIL FROM` accepted, recipients
    /// must resolve to a local mailbox.
    Mx,
    /// Port 587/465: `AUTH PLAIN`/`AUTH LOGIN` advertised, TLS required
    /// before AUTH unless `require_tls=false`, sender must be the
    /// authenticated user's own address (or an allowed alias).
    Submission,
}

impl Profile {
    pub fn advertises_auth(&self) -> bool {
        matches!(self, Profile::Submission)
    }

    pub fn allows_empty_mail_from(&self) -> bool {
        matches!(self, Profile::Mx)
    }

    pub fn requires_local_recipient(&self) -> bool {
        matches!(self, Profile::Mx)
    }
}
