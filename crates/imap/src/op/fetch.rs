/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::collections::HashMap;

use common::Core;
use store::Flags;
use utils::Deadline;

use crate::command::FetchItem;
use crate::op::resolve_to_uids;
use crate::response::{build_envelope, flags_fetch_item, Response, UntaggedLine};
use crate::sequence::SequenceSet;
use crate::session::Session;

pub async fn execute(
    core: &Core,
    session: &Session,
    set: &SequenceSet,
    items: &[FetchItem],
    uid_mode: bool,
    deadline: Deadline,
) -> Response {
    let Ok(mailbox) = session.require_selected() else {
        return Response::bad("command not permitted in this state");
    };
    let user_id = session.user_id.expect("selected implies authenticated");
    let targets = resolve_to_uids(session, set, uid_mode);
    if targets.is_empty() {
        return Response::ok("FETCH completed");
    }

    let messages = match core.store.list_messages(deadline, mailbox, usize::MAX, 0).await {
        Ok(messages) => messages,
        Err(_) => return Response::no("FETCH failed"),
    };
    let by_uid: HashMap<u32, store::Message> = messages.into_iter().map(|m| (m.uid, m)).collect();

    let mut untagged = Vec::new();
    for uid in targets {
        let Some(message) = by_uid.get(&uid) else { continue };
        let Some(seq) = session.snapshot.uid_to_seq(uid) else { continue };

        let mut flags = message.flags;
        let mut parts = Vec::new();
        let mut literal: Option<Vec<u8>> = None;

        for item in items {
            match item {
                FetchItem::Flags => parts.push(flags_fetch_item(flags)),
                FetchItem::Uid => parts.push(format!("UID {uid}")),
                FetchItem::InternalDate => parts.push(format!("INTERNALDATE \"{}\"", message.internal_date.to_rfc2822())),
                FetchItem::Rfc822Size => parts.push(format!("RFC822.SIZE {}", message.size)),
                FetchItem::Envelope => parts.push(format!("ENVELOPE {}", build_envelope(message))),
                FetchItem::Body { peek } => {
                    let body = core.store.read_body(user_id, mailbox, message).await.unwrap_or_default();
                    if !*peek && !flags.contains(Flags::SEEN) {
                        if let Ok(new_flags) =
                            core.store.update_flags(deadline, user_id, mailbox, uid, Flags(Flags::SEEN), true).await
                        {
                            flags = new_flags;
                        }
                    }
                    literal = Some(body);
                }
            }
        }

        match literal {
            Some(bytes) => {
                let prefix = if parts.is_empty() {
                    format!("{seq} FETCH (BODY[]")
                } else {
                    format!("{seq} FETCH ({} BODY[]", parts.join(" "))
                };
                untagged.push(UntaggedLine::Literal { prefix, bytes, suffix: ")".to_string() });
            }
            None => untagged.push(UntaggedLine::text(format!("{seq} FETCH ({})", parts.join(" ")))),
        }
    }

    Response::ok("FETCH completed").with_untagged(untagged)
}
