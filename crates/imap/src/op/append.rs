/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use common::Core;
use store::{Flags, StoreError};
use utils::Deadline;

use crate::idle::{IdleRegistry, Update, UpdateKind};
use crate::response::{parse_flag_token, Response};
use crate::session::Session;

pub async fn execute(
    core: &Core,
    idle: &IdleRegistry,
    session: &Session,
    mailbox_name: &str,
    flag_atoms: &[String],
    body: Vec<u8>,
    deadline: Deadline,
) -> Response {
    let Ok(user_id) = session.require_authenticated() else {
        return Response::bad("command not permitted in this state");
    };
    let mailbox = match core.store.get_mailbox(deadline, user_id, mailbox_name).await {
        Ok(mailbox) => mailbox,
        Err(_) => return Response::no("[TRYCREATE] no such mailbox"),
    };

    let mut flags = Flags::empty();
    for atom in flag_atoms {
        if let Some(bit) = parse_flag_token(atom) {
            flags.insert(bit);
        }
    }

    let headers = crate::headers::extract_message_headers(&body);
    match core
        .store
        .append_message(deadline, user_id, &mailbox, flags, chrono::Utc::now(), &body, headers)
        .await
    {
        Ok(uid) => {
            if let Ok(messages) = core.store.list_messages(deadline, &mailbox, usize::MAX, 0).await {
                idle.publish(Update { mailbox_id: mailbox.id, kind: UpdateKind::Exists { message_count: messages.len() as u32 } });
            }
            Response::ok(format!("[APPENDUID {} {uid}] APPEND completed", mailbox.uid_validity))
        }
        Err(StoreError::QuotaExceeded) => Response::no("quota exceeded"),
        Err(_) => Response::no("APPEND failed"),
    }
}
