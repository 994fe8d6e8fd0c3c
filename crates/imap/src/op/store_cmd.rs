/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use common::Core;
use store::Flags;
use utils::Deadline;

use crate::command::StoreMode;
use crate::idle::{IdleRegistry, Update, UpdateKind};
use crate::op::resolve_to_uids;
use crate::response::{flags_fetch_item, parse_flag_token, Response, UntaggedLine};
use crate::sequence::SequenceSet;
use crate::session::Session;

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    core: &Core,
    idle: &IdleRegistry,
    session: &Session,
    set: &SequenceSet,
    uid_mode: bool,
    mode: StoreMode,
    flag_atoms: &[String],
    silent: bool,
    deadline: Deadline,
) -> Response {
    let Ok(mailbox) = session.require_selected() else {
        return Response::bad("command not permitted in this state");
    };
    if session.read_only {
        return Response::no("mailbox selected read-only");
    }
    let user_id = session.user_id.expect("selected implies authenticated");

    let mut requested = Flags::empty();
    for atom in flag_atoms {
        match parse_flag_token(atom) {
            Some(bit) => requested.insert(bit),
            None => return Response::bad(format!("unknown flag: {atom}")),
        }
    }

    let targets = resolve_to_uids(session, set, uid_mode);
    let mut untagged = Vec::new();
    for uid in targets {
        let result = match mode {
            StoreMode::Add => core.store.update_flags(deadline, user_id, mailbox, uid, requested, true).await,
            StoreMode::Remove => core.store.update_flags(deadline, user_id, mailbox, uid, requested, false).await,
            StoreMode::Replace => core.store.set_flags(deadline, user_id, mailbox, uid, requested).await,
        };
        let Ok(new_flags) = result else { continue };
        idle.publish(Update { mailbox_id: mailbox.id, kind: UpdateKind::FlagsChanged { uid, flags: new_flags.0 } });
        if !silent {
            if let Some(seq) = session.snapshot.uid_to_seq(uid) {
                untagged.push(UntaggedLine::text(format!("{seq} FETCH ({})", flags_fetch_item(new_flags))));
            }
        }
    }
    Response::ok("STORE completed").with_untagged(untagged)
}
