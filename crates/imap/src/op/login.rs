/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::net::IpAddr;

use common::Core;
use directory::{Credentials, DirectoryError, QueryParams};
use policy::AuthRateLimiter;
use utils::Deadline;

use crate::response::Response;
use crate::session::Session;

pub fn capability() -> Response {
    Response::ok("CAPABILITY completed")
        .with_untagged_text(vec!["CAPABILITY IMAP4rev1 IDLE STARTTLS AUTH=PLAIN AUTH=LOGIN UIDPLUS".into()])
}

pub async fn login(
    core: &Core,
    session: &mut Session,
    auth_limiter: &AuthRateLimiter,
    peer_ip: IpAddr,
    creds: &Credentials,
    deadline: Deadline,
) -> Response {
    if auth_limiter.is_blocked(peer_ip) {
        return Response::no("too many authentication failures, try again later");
    }
    match core.directory.query(deadline, QueryParams::credentials(creds)).await {
        Ok(user) => {
            auth_limiter.record_success(peer_ip);
            match session.on_login(user.id) {
                Ok(()) => Response::ok("LOGIN completed"),
                Err(_) => Response::bad("command not permitted in this state"),
            }
        }
        Err(DirectoryError::InvalidCredentials) | Err(DirectoryError::NotFound) => {
            auth_limiter.record_failure(peer_ip);
            Response::no("authentication failed")
        }
        Err(DirectoryError::Inactive) => Response::no("account disabled"),
        Err(_) => Response::no("temporary authentication failure"),
    }
}

pub fn logout(session: &mut Session) -> Response {
    session.on_logout();
    Response::ok("LOGOUT completed")
        .with_untagged_text(vec!["BYE IMAP4rev1 server logging out".into()])
        .closing()
}

pub fn noop() -> Response {
    Response::ok("NOOP completed")
}

pub fn check() -> Response {
    Response::ok("CHECK completed")
}

/// Records the TLS transition on the session; the actual handshake upgrade
/// happens in the listener's acceptor wrapper, matching the SMTP listener's
/// STARTTLS split.
pub fn starttls(session: &mut Session) -> Response {
    match session.on_starttls() {
        Ok(()) => Response::ok("begin TLS negotiation now").upgrading_tls(),
        Err(_) => Response::bad("command not permitted in this state"),
    }
}
