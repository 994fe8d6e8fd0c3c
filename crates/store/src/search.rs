/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Translates a [`SearchCriteria`] into a single parameterized SQL query
//! over `messages` (§4.2 SearchMessages). Flag presence/absence is checked
//! with bitwise `&` against the stored `flags` integer rather than joining
//! out to a separate flags table.

use rusqlite::params_from_iter;

use crate::{Mailbox, Result, SearchCriteria, Store};
use utils::Deadline;

pub async fn search(
    store: &Store,
    deadline: Deadline,
    mailbox: &Mailbox,
    criteria: SearchCriteria,
) -> Result<Vec<u32>> {
    let mailbox_id = mailbox.id;
    store
        .with_conn(deadline, move |conn| {
            let mut clauses = vec!["mailbox_id = ?1".to_string()];
            let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(mailbox_id)];

            if let Some(since) = criteria.since {
                clauses.push(format!("internal_date >= ?{}", args.len() + 1));
                args.push(Box::new(since.to_rfc3339()));
            }
            if let Some(before) = criteria.before {
                clauses.push(format!("internal_date < ?{}", args.len() + 1));
                args.push(Box::new(before.to_rfc3339()));
            }
            if let Some(larger) = criteria.larger {
                clauses.push(format!("size > ?{}", args.len() + 1));
                args.push(Box::new(larger));
            }
            if let Some(smaller) = criteria.smaller {
                clauses.push(format!("size < ?{}", args.len() + 1));
                args.push(Box::new(smaller));
            }
            for flag in &criteria.flags_present {
                clauses.push(format!("(flags & ?{}) = ?{}", args.len() + 1, args.len() + 1));
                args.push(Box::new(*flag as i64));
            }
            for flag in &criteria.flags_absent {
                clauses.push(format!("(flags & ?{}) = 0", args.len() + 1));
                args.push(Box::new(*flag as i64));
            }
            if let Some(pat) = &criteria.from_contains {
                clauses.push(format!("from_addr LIKE ?{} ESCAPE '\\'", args.len() + 1));
                args.push(Box::new(format!("%{}%", escape_like(pat))));
            }
            if let Some(pat) = &criteria.to_contains {
                clauses.push(format!("to_list LIKE ?{} ESCAPE '\\'", args.len() + 1));
                args.push(Box::new(format!("%{}%", escape_like(pat))));
            }
            if let Some(pat) = &criteria.subject_contains {
                clauses.push(format!("subject LIKE ?{} ESCAPE '\\'", args.len() + 1));
                args.push(Box::new(format!("%{}%", escape_like(pat))));
            }

            let sql = format!(
                "SELECT uid FROM messages WHERE {} ORDER BY uid ASC",
                clauses.join(" AND ")
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args.iter().map(|b| b.as_ref())), |row| {
                    row.get::<_, i64>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(|u| u as u32).collect())
        })
        .await
}

/// Escapes `%`, `_`, and the escape character itself so substring search
/// terms can't smuggle in LIKE wildcards.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '%' || c == '_' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
