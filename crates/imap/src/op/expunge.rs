/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use common::Core;
use store::Flags;
use utils::Deadline;

use crate::idle::{IdleRegistry, Update, UpdateKind};
use crate::response::{Response, UntaggedLine};
use crate::session::Session;

pub async fn execute(core: &Core, idle: &IdleRegistry, session: &mut Session, deadline: Deadline) -> Response {
    let Ok(mailbox) = session.require_selected().map(|m| m.clone()) else {
        return Response::bad("command not permitted in this state");
    };
    let user_id = session.user_id.expect("selected implies authenticated");
    let messages = match core.store.list_messages(deadline, &mailbox, usize::MAX, 0).await {
        Ok(messages) => messages,
        Err(_) => return Response::no("EXPUNGE failed"),
    };
    let deleted_uids: Vec<u32> = messages.iter().filter(|m| m.flags.contains(Flags::DELETED)).map(|m| m.uid).collect();
    if core.store.expunge_mailbox(deadline, user_id, &mailbox).await.is_err() {
        return Response::no("EXPUNGE failed");
    }

    // The storage layer's own returned sequence numbers reflect live
    // ordering; this session reports against its own frozen snapshot so
    // numbers already handed to the client stay consistent (§4.3
    // Concurrency).
    let seqs = session.snapshot.apply_expunge(&deleted_uids);
    let untagged = seqs.iter().map(|seq| UntaggedLine::text(format!("{seq} EXPUNGE"))).collect();
    for uid in deleted_uids {
        idle.publish(Update { mailbox_id: mailbox.id, kind: UpdateKind::Expunge { uid } });
    }
    Response::ok("EXPUNGE completed").with_untagged(untagged)
}
