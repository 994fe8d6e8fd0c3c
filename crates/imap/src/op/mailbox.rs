/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use common::Core;
use store::{Flags, StoreError};
use utils::Deadline;

use crate::command::StatusItem;
use crate::response::{glob_match, Response};
use crate::session::Session;

pub async fn select(core: &Core, session: &mut Session, name: &str, read_only: bool, deadline: Deadline) -> Response {
    let Ok(user_id) = session.require_authenticated() else {
        return Response::bad("command not permitted in this state");
    };
    let mailbox = match core.store.get_mailbox(deadline, user_id, name).await {
        Ok(mailbox) => mailbox,
        Err(_) => return Response::no("[TRYCREATE] no such mailbox"),
    };
    let messages = match core.store.list_messages(deadline, &mailbox, usize::MAX, 0).await {
        Ok(messages) => messages,
        Err(_) => return Response::no("temporary failure"),
    };
    let exists = messages.len();
    let recent = messages.iter().filter(|m| m.flags.contains(Flags::RECENT)).count();
    let unseen = messages.iter().position(|m| !m.flags.contains(Flags::SEEN)).map(|i| i + 1);
    let uids = messages.iter().map(|m| m.uid).collect();
    let uid_validity = mailbox.uid_validity;
    let uid_next = mailbox.uid_next;

    if session.on_select(mailbox, uids, read_only).is_err() {
        return Response::bad("command not permitted in this state");
    }

    let mut untagged = vec![
        format!("{exists} EXISTS"),
        format!("{recent} RECENT"),
        r"FLAGS (\Answered \Flagged \Deleted \Draft \Seen)".to_string(),
        r"OK [PERMANENTFLAGS (\Answered \Flagged \Deleted \Draft \Seen)] Limited".to_string(),
        format!("OK [UIDVALIDITY {uid_validity}] UIDs valid"),
        format!("OK [UIDNEXT {uid_next}] Predicted next UID"),
    ];
    if let Some(unseen) = unseen {
        untagged.push(format!("OK [UNSEEN {unseen}] first unseen message"));
    }
    let (mode, verb) = if read_only { ("READ-ONLY", "EXAMINE") } else { ("READ-WRITE", "SELECT") };
    Response::ok(format!("[{mode}] {verb} completed")).with_untagged_text(untagged)
}

pub async fn create(core: &Core, session: &Session, name: &str, deadline: Deadline) -> Response {
    let Ok(user_id) = session.require_authenticated() else {
        return Response::bad("command not permitted in this state");
    };
    match core.store.create_mailbox(deadline, user_id, name, None).await {
        Ok(_) => Response::ok("CREATE completed"),
        Err(StoreError::Duplicate) => Response::no("mailbox already exists"),
        Err(_) => Response::no("CREATE failed"),
    }
}

pub async fn delete(core: &Core, session: &Session, name: &str, deadline: Deadline) -> Response {
    let Ok(user_id) = session.require_authenticated() else {
        return Response::bad("command not permitted in this state");
    };
    let mailbox = match core.store.get_mailbox(deadline, user_id, name).await {
        Ok(mailbox) => mailbox,
        Err(_) => return Response::no("no such mailbox"),
    };
    match core.store.delete_mailbox(deadline, &mailbox).await {
        Ok(()) => Response::ok("DELETE completed"),
        Err(_) => Response::no("cannot delete this mailbox"),
    }
}

/// `RENAME` has no direct storage primitive; it is expressed as create the
/// target, copy every message across preserving flags, then delete the
/// source (§4.3, mailbox tree operations map onto `store::ops`).
pub async fn rename(core: &Core, session: &Session, from: &str, to: &str, deadline: Deadline) -> Response {
    let Ok(user_id) = session.require_authenticated() else {
        return Response::bad("command not permitted in this state");
    };
    let src = match core.store.get_mailbox(deadline, user_id, from).await {
        Ok(mailbox) => mailbox,
        Err(_) => return Response::no("no such mailbox"),
    };
    let dst = match core.store.create_mailbox(deadline, user_id, to, Some(src.special_use)).await {
        Ok(mailbox) => mailbox,
        Err(StoreError::Duplicate) => return Response::no("target mailbox already exists"),
        Err(_) => return Response::no("RENAME failed"),
    };
    let messages = match core.store.list_messages(deadline, &src, usize::MAX, 0).await {
        Ok(messages) => messages,
        Err(_) => return Response::no("RENAME failed"),
    };
    for message in &messages {
        if core.store.copy_message(deadline, user_id, &src, message.uid, &dst).await.is_err() {
            return Response::no("RENAME failed partway through");
        }
    }
    match core.store.delete_mailbox(deadline, &src).await {
        Ok(()) => Response::ok("RENAME completed"),
        Err(_) => Response::no("RENAME failed to remove source mailbox"),
    }
}

pub async fn set_subscribed(core: &Core, session: &Session, name: &str, subscribed: bool, deadline: Deadline) -> Response {
    let Ok(user_id) = session.require_authenticated() else {
        return Response::bad("command not permitted in this state");
    };
    let mailbox = match core.store.get_mailbox(deadline, user_id, name).await {
        Ok(mailbox) => mailbox,
        Err(_) => return Response::no("no such mailbox"),
    };
    match core.store.set_subscribed(deadline, mailbox.id, subscribed).await {
        Ok(()) => Response::ok(if subscribed { "SUBSCRIBE completed" } else { "UNSUBSCRIBE completed" }),
        Err(_) => Response::no("failed"),
    }
}

pub async fn list(core: &Core, session: &Session, reference: &str, pattern: &str, subscribed_only: bool, deadline: Deadline) -> Response {
    let Ok(user_id) = session.require_authenticated() else {
        return Response::bad("command not permitted in this state");
    };
    let verb = if subscribed_only { "LSUB" } else { "LIST" };
    if pattern.is_empty() {
        return Response::ok(format!("{verb} completed")).with_untagged_text(vec![format!(r#"{verb} (\Noselect) "/" """#)]);
    }
    let mailboxes = match core.store.list_mailboxes(deadline, user_id).await {
        Ok(mailboxes) => mailboxes,
        Err(_) => return Response::no(format!("{verb} failed")),
    };
    let full_pattern = format!("{reference}{pattern}");
    let mut untagged = Vec::new();
    for mailbox in mailboxes {
        if subscribed_only && !mailbox.subscribed {
            continue;
        }
        if !glob_match(&full_pattern, &mailbox.name) {
            continue;
        }
        untagged.push(format!(r#"{verb} (\HasNoChildren) "/" "{}""#, mailbox.name));
    }
    Response::ok(format!("{verb} completed")).with_untagged_text(untagged)
}

pub async fn status(core: &Core, session: &Session, name: &str, items: &[StatusItem], deadline: Deadline) -> Response {
    let Ok(user_id) = session.require_authenticated() else {
        return Response::bad("command not permitted in this state");
    };
    let mailbox = match core.store.get_mailbox(deadline, user_id, name).await {
        Ok(mailbox) => mailbox,
        Err(_) => return Response::no("no such mailbox"),
    };
    let messages = match core.store.list_messages(deadline, &mailbox, usize::MAX, 0).await {
        Ok(messages) => messages,
        Err(_) => return Response::no("STATUS failed"),
    };
    let mut parts = Vec::new();
    for item in items {
        let part = match item {
            StatusItem::Messages => format!("MESSAGES {}", messages.len()),
            StatusItem::Recent => format!("RECENT {}", messages.iter().filter(|m| m.flags.contains(Flags::RECENT)).count()),
            StatusItem::UidNext => format!("UIDNEXT {}", mailbox.uid_next),
            StatusItem::UidValidity => format!("UIDVALIDITY {}", mailbox.uid_validity),
            StatusItem::Unseen => format!("UNSEEN {}", messages.iter().filter(|m| !m.flags.contains(Flags::SEEN)).count()),
        };
        parts.push(part);
    }
    let line = format!(r#"STATUS "{}" ({})"#, mailbox.name, parts.join(" "));
    Response::ok("STATUS completed").with_untagged_text(vec![line])
}

/// `CLOSE` always expunges `\Deleted` messages, regardless of whether the
/// mailbox was opened read-only (RFC 3501 §6.4.2), then unselects silently.
pub async fn close(core: &Core, session: &mut Session, deadline: Deadline) -> Response {
    let Ok(mailbox) = session.require_selected().map(|m| m.clone()) else {
        return Response::bad("command not permitted in this state");
    };
    let user_id = session.user_id.expect("selected implies authenticated");
    let _ = core.store.expunge_mailbox(deadline, user_id, &mailbox).await;
    let _ = session.on_close();
    Response::ok("CLOSE completed")
}

pub fn unselect(session: &mut Session) -> Response {
    if session.require_selected().is_err() {
        return Response::bad("command not permitted in this state");
    }
    let _ = session.on_close();
    Response::ok("UNSELECT completed")
}
