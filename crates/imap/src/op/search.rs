/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use common::Core;
use store::SearchCriteria;
use utils::Deadline;

use crate::command::SearchKey;
use crate::response::{Response, UntaggedLine};
use crate::session::Session;

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%d-%b-%Y").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn build_criteria(key: &SearchKey) -> SearchCriteria {
    let mut criteria = SearchCriteria {
        since: key.since.as_deref().and_then(parse_date),
        before: key.before.as_deref().and_then(parse_date),
        larger: key.larger,
        smaller: key.smaller,
        from_contains: key.from_contains.clone(),
        to_contains: key.to_contains.clone(),
        subject_contains: key.subject_contains.clone(),
        ..Default::default()
    };
    if let Some(seen) = key.seen {
        if seen {
            criteria.flags_present.push(store::Flags::SEEN);
        } else {
            criteria.flags_absent.push(store::Flags::SEEN);
        }
    }
    if let Some(deleted) = key.deleted {
        if deleted {
            criteria.flags_present.push(store::Flags::DELETED);
        } else {
            criteria.flags_absent.push(store::Flags::DELETED);
        }
    }
    criteria
}

pub async fn execute(core: &Core, session: &Session, key: &SearchKey, uid_mode: bool, deadline: Deadline) -> Response {
    let Ok(mailbox) = session.require_selected() else {
        return Response::bad("command not permitted in this state");
    };
    let criteria = build_criteria(key);
    let uids = match core.store.search_messages(deadline, mailbox, criteria).await {
        Ok(uids) => uids,
        Err(_) => return Response::no("SEARCH failed"),
    };

    let mut numbers = Vec::new();
    for uid in uids {
        let Some(seq) = session.snapshot.uid_to_seq(uid) else { continue };
        numbers.push(if uid_mode { uid } else { seq });
    }
    let line = if numbers.is_empty() {
        "SEARCH".to_string()
    } else {
        format!("SEARCH {}", numbers.iter().map(u32::to_string).collect::<Vec<_>>().join(" "))
    };
    Response::ok("SEARCH completed").with_untagged(vec![UntaggedLine::text(line)])
}
