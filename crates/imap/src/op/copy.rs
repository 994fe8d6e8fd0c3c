/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use common::Core;
use utils::Deadline;

use crate::idle::{IdleRegistry, Update, UpdateKind};
use crate::op::resolve_to_uids;
use crate::response::Response;
use crate::sequence::SequenceSet;
use crate::session::Session;

pub async fn execute(
    core: &Core,
    idle: &IdleRegistry,
    session: &Session,
    set: &SequenceSet,
    uid_mode: bool,
    target_name: &str,
    deadline: Deadline,
) -> Response {
    let Ok(src) = session.require_selected() else {
        return Response::bad("command not permitted in this state");
    };
    let user_id = session.user_id.expect("selected implies authenticated");
    let dst = match core.store.get_mailbox(deadline, user_id, target_name).await {
        Ok(mailbox) => mailbox,
        Err(_) => return Response::no("[TRYCREATE] no such mailbox"),
    };

    let targets = resolve_to_uids(session, set, uid_mode);
    for uid in &targets {
        if core.store.copy_message(deadline, user_id, src, *uid, &dst).await.is_err() {
            return Response::no("COPY failed partway through");
        }
    }
    if !targets.is_empty() {
        if let Ok(messages) = core.store.list_messages(deadline, &dst, usize::MAX, 0).await {
            idle.publish(Update { mailbox_id: dst.id, kind: UpdateKind::Exists { message_count: messages.len() as u32 } });
        }
    }
    Response::ok("COPY completed")
}
