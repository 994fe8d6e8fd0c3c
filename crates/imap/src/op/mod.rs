/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Command dispatch: maps a parsed [`crate::command::Command`] onto storage
//! operations, one module per command group.

pub mod append;
pub mod copy;
pub mod expunge;
pub mod fetch;
pub mod login;
pub mod mailbox;
pub mod search;
pub mod store_cmd;

use std::net::IpAddr;

use common::Core;
use directory::Credentials;
use policy::AuthRateLimiter;
use trc::{Collector, EventType, ImapEvent, Key};
use utils::Deadline;

use crate::command::Command;
use crate::idle::IdleRegistry;
use crate::response::Response;
use crate::session::Session;

/// Resolves a client-supplied sequence/UID set to the message UIDs it
/// names, against the session's frozen `MailboxSnapshot` (§4.3 Concurrency).
pub(crate) fn resolve_to_uids(session: &Session, set: &crate::sequence::SequenceSet, uid_mode: bool) -> Vec<u32> {
    if uid_mode {
        let max_uid = session.snapshot.uids.iter().copied().max().unwrap_or(0);
        set.resolve(max_uid)
            .into_iter()
            .filter(|uid| session.snapshot.uid_to_seq(*uid).is_some())
            .collect()
    } else {
        let max_seq = session.snapshot.len() as u32;
        set.resolve(max_seq)
            .into_iter()
            .filter_map(|seq| session.snapshot.seq_to_uid(seq))
            .collect()
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn dispatch(
    core: &Core,
    idle: &IdleRegistry,
    session: &mut Session,
    collector: &dyn Collector,
    auth_limiter: &AuthRateLimiter,
    peer_ip: IpAddr,
    cmd: Command,
    deadline: Deadline,
) -> Response {
    match cmd {
        Command::Capability => login::capability(),
        Command::Login { username, password } => {
            let creds = Credentials::Plain { username: username.clone(), password };
            let resp = login::login(core, session, auth_limiter, peer_ip, &creds, deadline).await;
            if resp.status == crate::response::Status::Ok {
                collector.record(ImapEvent::Login.into_err().ctx(Key::AccountId, username));
            } else {
                collector.record(ImapEvent::LoginFailed.into_err().ctx(Key::RemoteIp, peer_ip.to_string()));
            }
            resp
        }
        Command::Logout => login::logout(session),
        Command::Noop => login::noop(),
        Command::Check => login::check(),
        Command::StartTls => login::starttls(session),
        Command::Select(name) => {
            let resp = mailbox::select(core, session, &name, false, deadline).await;
            collector.record(ImapEvent::Select.into_err());
            resp
        }
        Command::Examine(name) => mailbox::select(core, session, &name, true, deadline).await,
        Command::Create(name) => mailbox::create(core, session, &name, deadline).await,
        Command::Delete(name) => mailbox::delete(core, session, &name, deadline).await,
        Command::Rename { from, to } => mailbox::rename(core, session, &from, &to, deadline).await,
        Command::Subscribe(name) => mailbox::set_subscribed(core, session, &name, true, deadline).await,
        Command::Unsubscribe(name) => mailbox::set_subscribed(core, session, &name, false, deadline).await,
        Command::List { reference, pattern } => mailbox::list(core, session, &reference, &pattern, false, deadline).await,
        Command::Lsub { reference, pattern } => mailbox::list(core, session, &reference, &pattern, true, deadline).await,
        Command::Status { mailbox: name, items } => mailbox::status(core, session, &name, &items, deadline).await,
        Command::Close => mailbox::close(core, session, deadline).await,
        Command::Unselect => mailbox::unselect(session),
        Command::Expunge => {
            let resp = expunge::execute(core, idle, session, deadline).await;
            collector.record(ImapEvent::Expunge.into_err());
            resp
        }
        Command::Search { criteria, uid } => {
            let resp = search::execute(core, session, &criteria, uid, deadline).await;
            collector.record(ImapEvent::Search.into_err());
            resp
        }
        Command::Fetch { set, items, uid } => {
            let resp = fetch::execute(core, session, &set, &items, uid, deadline).await;
            collector.record(ImapEvent::Fetch.into_err());
            resp
        }
        Command::Store { set, uid, mode, flags, silent } => {
            let resp = store_cmd::execute(core, idle, session, &set, uid, mode, &flags, silent, deadline).await;
            collector.record(ImapEvent::Store.into_err());
            resp
        }
        Command::Copy { set, uid, mailbox: name } => {
            let resp = copy::execute(core, idle, session, &set, uid, &name, deadline).await;
            collector.record(ImapEvent::Copy.into_err());
            resp
        }
        Command::Idle => {
            if session.require_selected().is_err() {
                return Response::bad("command not permitted in this state");
            }
            collector.record(ImapEvent::IdleStart.into_err());
            Response::ok("idling").idling()
        }
        Command::Done => Response::bad("not idling"),
        // `APPEND` is always routed around the generic dispatcher: the
        // listener must read the literal body before `op::append::execute`
        // can run, so the parser only ever yields `ParsedLine::AppendPending`.
        Command::Append { .. } => Response::bad("APPEND requires a literal body"),
    }
}
