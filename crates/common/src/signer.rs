/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! DKIM signing/verification keys and DNS record lookups are opaque per the
//! spec's Open Questions: the implementer provides a `Signer`/`Verifier`
//! and injects it. These traits are the seam; any concrete crypto/DNS
//! wiring lives outside this workspace.

/// Signs outbound mail on the submission path (§4.1 submission profile:
/// "Outbound messages are DKIM-signed per sender domain if a signer is
/// configured").
pub trait Signer: Send + Sync {
    /// Returns the `DKIM-Signature:` header value to prepend, or `None` if
    /// no key is configured for `domain`.
    fn sign(&self, domain: &str, message: &[u8]) -> Option<String>;
}

/// Verifies SPF/DKIM/DMARC on inbound MX traffic (§4.2 Ingress Pipeline:
/// "optional SPF/DKIM/DMARC verify").
pub trait Verifier: Send + Sync {
    fn verify_spf(&self, client_ip: std::net::IpAddr, mail_from: &str, helo: &str) -> SpfResult;
    fn verify_dkim(&self, message: &[u8]) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpfResult {
    Pass,
    Fail,
    SoftFail,
    Neutral,
    None,
    TempError,
    PermError,
}
