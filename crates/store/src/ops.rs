/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use utils::Deadline;

use crate::{
    maildir, Flags, Mailbox, Message, MessageHeaders, Result, SearchCriteria, SpecialUse, Store,
    StoreError, User,
};

/// Host component used in generated Maildir++ keys. Process-wide constant;
/// a real deployment would source this from the node's hostname.
const MAILDIR_HOST: &str = "mail";

/// One message destined for one mailbox, as passed to
/// [`Store::append_messages`].
#[derive(Debug, Clone)]
pub struct AppendTarget {
    pub user_id: i64,
    pub mailbox: Mailbox,
    pub flags: Flags,
    pub internal_date: DateTime<Utc>,
    pub body: Vec<u8>,
    pub headers: MessageHeaders,
}

struct PreparedAppend {
    target: AppendTarget,
    key: String,
    tmp: std::path::PathBuf,
    linked: std::path::PathBuf,
}

struct AppendRow {
    user_id: i64,
    mailbox_id: i64,
    key: String,
    size: i64,
    internal_date: DateTime<Utc>,
    flags: Flags,
    headers: MessageHeaders,
}

fn rollback_prepared(prepared: &[PreparedAppend]) {
    for p in prepared {
        maildir::rollback_link(&p.linked);
        let _ = maildir::unlink_tmp(&p.tmp);
    }
}

impl Store {
    pub async fn create_domain(&self, deadline: Deadline, name: &str) -> Result<i64> {
        let name = name.to_string();
        self.with_conn(deadline, move |conn| {
            conn.execute(
                "INSERT INTO domains (name, active) VALUES (?1, 1)",
                params![name],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::Duplicate
                }
                other => other.into(),
            })?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn create_user(
        &self,
        deadline: Deadline,
        domain_id: i64,
        local_part: &str,
        password_hash: &str,
        quota_bytes: i64,
    ) -> Result<i64> {
        let local_part = local_part.to_string();
        let password_hash = password_hash.to_string();
        let user_id = self
            .with_conn(deadline, move |conn| {
                conn.execute(
                    "INSERT INTO users (domain_id, local_part, password_hash, quota_bytes) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![domain_id, local_part, password_hash, quota_bytes],
                )
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(err, _)
                        if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        StoreError::Duplicate
                    }
                    other => other.into(),
                })?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        for special in SpecialUse::AUTO_CREATED {
            self.create_mailbox(deadline, user_id, special.as_str(), Some(special))
                .await?;
        }
        Ok(user_id)
    }

    pub async fn find_user_by_address(
        &self,
        deadline: Deadline,
        local_part: &str,
        domain_name: &str,
    ) -> Result<Option<User>> {
        let local_part = local_part.to_lowercase();
        let domain_name = domain_name.to_lowercase();
        self.with_conn(deadline, move |conn| {
            conn.query_row(
                "SELECT u.id, u.domain_id, u.local_part, u.password_hash, u.display_name, \
                        u.quota_bytes, u.used_bytes, u.is_admin, u.active \
                 FROM users u JOIN domains d ON d.id = u.domain_id \
                 WHERE lower(u.local_part) = ?1 AND lower(d.name) = ?2",
                params![local_part, domain_name],
                row_to_user,
            )
            .optional()
            .map_err(Into::into)
        })
        .await
    }

    /// Resolves a local alias to its target address (Open Question (a):
    /// aliases are expanded unconditionally before RCPT TO is accepted).
    pub async fn resolve_alias(
        &self,
        deadline: Deadline,
        local_part: &str,
        domain_name: &str,
    ) -> Result<Option<String>> {
        let local_part = local_part.to_lowercase();
        let domain_name = domain_name.to_lowercase();
        self.with_conn(deadline, move |conn| {
            conn.query_row(
                "SELECT a.target_address FROM aliases a JOIN domains d ON d.id = a.domain_id \
                 WHERE lower(a.source_local_part) = ?1 AND lower(d.name) = ?2",
                params![local_part, domain_name],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(Into::into)
        })
        .await
    }

    /// Allocates a fresh `uid_validity` from the per-server monotonic
    /// counter (never reused, even if a mailbox of the same name was
    /// deleted and recreated — Invariant M1) and creates the mailbox row
    /// plus its `tmp/new/cur` directories.
    pub async fn create_mailbox(
        &self,
        deadline: Deadline,
        user_id: i64,
        name: &str,
        special_use: Option<SpecialUse>,
    ) -> Result<Mailbox> {
        let name = name.to_string();
        let root = self.maildir_root.clone();
        let mailbox = self
            .with_conn(deadline, move |conn| {
                let tx = conn.transaction()?;
                let uid_validity: i64 = tx.query_row(
                    "UPDATE uid_validity_seq SET next_value = next_value + 1 \
                     WHERE id = 1 RETURNING next_value - 1",
                    [],
                    |row| row.get(0),
                )?;
                let special_str = special_use.map(|s| s.as_str()).unwrap_or("none");
                tx.execute(
                    "INSERT INTO mailboxes (user_id, name, uid_validity, uid_next, special_use) \
                     VALUES (?1, ?2, ?3, 1, ?4)",
                    params![user_id, name, uid_validity, special_str],
                )
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(err, _)
                        if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        StoreError::Duplicate
                    }
                    other => other.into(),
                })?;
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(Mailbox {
                    id,
                    user_id,
                    name: name.clone(),
                    uid_validity: uid_validity as u32,
                    uid_next: 1,
                    subscribed: true,
                    special_use: special_use.unwrap_or(SpecialUse::None),
                })
            })
            .await?;
        maildir::ensure_mailbox_dirs(&root, user_id, &mailbox.name)?;
        Ok(mailbox)
    }

    pub async fn get_mailbox(
        &self,
        deadline: Deadline,
        user_id: i64,
        name: &str,
    ) -> Result<Mailbox> {
        let name = name.to_string();
        self.with_conn(deadline, move |conn| {
            conn.query_row(
                "SELECT id, user_id, name, uid_validity, uid_next, subscribed, special_use \
                 FROM mailboxes WHERE user_id = ?1 AND name = ?2",
                params![user_id, name],
                row_to_mailbox,
            )
            .map_err(Into::into)
        })
        .await
    }

    pub async fn set_subscribed(&self, deadline: Deadline, mailbox_id: i64, subscribed: bool) -> Result<()> {
        self.with_conn(deadline, move |conn| {
            conn.execute(
                "UPDATE mailboxes SET subscribed = ?1 WHERE id = ?2",
                params![subscribed as i64, mailbox_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_mailboxes(&self, deadline: Deadline, user_id: i64) -> Result<Vec<Mailbox>> {
        self.with_conn(deadline, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, uid_validity, uid_next, subscribed, special_use \
                 FROM mailboxes WHERE user_id = ?1 ORDER BY name",
            )?;
            let rows = stmt
                .query_map(params![user_id], row_to_mailbox)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// Deletes the mailbox row, cascading messages, and removes the
    /// maildir subtree. Disallowed for Inbox.
    pub async fn delete_mailbox(&self, deadline: Deadline, mailbox: &Mailbox) -> Result<()> {
        if mailbox.special_use == SpecialUse::Inbox {
            return Err(StoreError::Sql("cannot delete Inbox".into()));
        }
        let id = mailbox.id;
        self.with_conn(deadline, move |conn| {
            conn.execute("DELETE FROM mailboxes WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await?;
        maildir::remove_mailbox_dirs(&self.maildir_root, mailbox.user_id, &mailbox.name)?;
        Ok(())
    }

    /// Streams `body` to `tmp/`, fsyncs, assigns `uid = uid_next; uid_next
    /// += 1` inside the same transaction that inserts the row, then links
    /// into `new/` (or `cur/` if `Seen` is set). Returns the assigned UID.
    /// Fails with `QuotaExceeded` if the user's quota would be exceeded
    /// (§4.2 AppendMessage).
    ///
    /// A thin single-recipient wrapper around [`Store::append_messages`];
    /// callers delivering one accepted message to several local mailboxes
    /// must use that instead so all rows land in one transaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn append_message(
        &self,
        deadline: Deadline,
        user_id: i64,
        mailbox: &Mailbox,
        flags: Flags,
        internal_date: DateTime<Utc>,
        body: &[u8],
        headers: MessageHeaders,
    ) -> Result<u32> {
        let target = AppendTarget {
            user_id,
            mailbox: mailbox.clone(),
            flags,
            internal_date,
            body: body.to_vec(),
            headers,
        };
        Ok(self.append_messages(deadline, vec![target]).await?[0])
    }

    /// Delivers one accepted message to every target mailbox in a single
    /// SQLite transaction: either every row is inserted and every quota is
    /// charged, or none is. A message with several local recipients must
    /// never be visible as delivered to some and missing for others
    /// (§4.1 message commit atomicity).
    ///
    /// Maildir links are written before the transaction opens (they have no
    /// transactional semantics of their own); if the DB phase fails for any
    /// target, every link already written for this call is rolled back so
    /// no mailbox is left holding a message whose row never committed.
    pub async fn append_messages(
        &self,
        deadline: Deadline,
        targets: Vec<AppendTarget>,
    ) -> Result<Vec<u32>> {
        let mut prepared = Vec::with_capacity(targets.len());
        for target in targets {
            let mailbox_dir =
                maildir::ensure_mailbox_dirs(&self.maildir_root, target.user_id, &target.mailbox.name)?;
            let key = maildir::new_key(MAILDIR_HOST);
            let tmp = match maildir::write_tmp(&mailbox_dir, &key, &target.body) {
                Ok(tmp) => tmp,
                Err(e) => {
                    rollback_prepared(&prepared);
                    return Err(e);
                }
            };
            let linked = match maildir::link_into_mailbox(&tmp, &mailbox_dir, &key, target.flags) {
                Ok(path) => path,
                Err(e) => {
                    let _ = maildir::unlink_tmp(&tmp);
                    rollback_prepared(&prepared);
                    return Err(e);
                }
            };
            prepared.push(PreparedAppend { target, key, tmp, linked });
        }

        let rows: Vec<_> = prepared
            .iter()
            .map(|p| AppendRow {
                user_id: p.target.user_id,
                mailbox_id: p.target.mailbox.id,
                key: p.key.clone(),
                size: p.target.body.len() as i64,
                internal_date: p.target.internal_date,
                flags: p.target.flags,
                headers: p.target.headers.clone(),
            })
            .collect();

        let result = self
            .with_conn(deadline, move |conn| {
                let tx = conn.transaction()?;
                let mut uids = Vec::with_capacity(rows.len());
                for row in &rows {
                    let (quota_bytes, used_bytes): (i64, i64) = tx.query_row(
                        "SELECT quota_bytes, used_bytes FROM users WHERE id = ?1",
                        params![row.user_id],
                        |r| Ok((r.get(0)?, r.get(1)?)),
                    )?;
                    if used_bytes + row.size > quota_bytes {
                        return Err(StoreError::QuotaExceeded);
                    }

                    let uid: i64 = tx.query_row(
                        "UPDATE mailboxes SET uid_next = uid_next + 1 WHERE id = ?1 \
                         RETURNING uid_next - 1",
                        params![row.mailbox_id],
                        |r| r.get(0),
                    )?;

                    tx.execute(
                        "INSERT INTO messages (mailbox_id, uid, maildir_key, size, internal_date, \
                         flags, message_id, subject, from_addr, to_list, in_reply_to, references_hdr) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                        params![
                            row.mailbox_id,
                            uid,
                            row.key,
                            row.size,
                            row.internal_date.to_rfc3339(),
                            row.flags.0,
                            row.headers.message_id,
                            row.headers.subject,
                            row.headers.from_addr,
                            row.headers.to_list,
                            row.headers.in_reply_to,
                            row.headers.references,
                        ],
                    )?;

                    tx.execute(
                        "UPDATE users SET used_bytes = used_bytes + ?1 WHERE id = ?2",
                        params![row.size, row.user_id],
                    )?;

                    uids.push(uid as u32);
                }
                tx.commit()?;
                Ok(uids)
            })
            .await;

        match result {
            Ok(uids) => {
                for p in &prepared {
                    let _ = maildir::unlink_tmp(&p.tmp);
                }
                Ok(uids)
            }
            Err(e) => {
                rollback_prepared(&prepared);
                Err(e)
            }
        }
    }

    async fn load_message(&self, deadline: Deadline, mailbox_id: i64, uid: u32) -> Result<Message> {
        self.with_conn(deadline, move |conn| {
            conn.query_row(
                "SELECT id, mailbox_id, uid, maildir_key, size, internal_date, flags, \
                        message_id, subject, from_addr, to_list, in_reply_to, references_hdr \
                 FROM messages WHERE mailbox_id = ?1 AND uid = ?2",
                params![mailbox_id, uid],
                row_to_message,
            )
            .map_err(Into::into)
        })
        .await
    }

    /// Adds (or removes) `flags`, renaming the maildir file so the on-disk
    /// state and the DB agree (§4.2 UpdateFlags).
    pub async fn update_flags(
        &self,
        deadline: Deadline,
        user_id: i64,
        mailbox: &Mailbox,
        uid: u32,
        flags: Flags,
        add: bool,
    ) -> Result<Flags> {
        let message = self.load_message(deadline, mailbox.id, uid).await?;
        let new_flags = if add {
            message.flags.add(flags)
        } else {
            message.flags.subtract(flags)
        };
        self.set_flags_inner(deadline, user_id, mailbox, &message, new_flags)
            .await
    }

    /// Replaces the flag set outright (§4.2 SetFlags).
    pub async fn set_flags(
        &self,
        deadline: Deadline,
        user_id: i64,
        mailbox: &Mailbox,
        uid: u32,
        flags: Flags,
    ) -> Result<Flags> {
        let message = self.load_message(deadline, mailbox.id, uid).await?;
        self.set_flags_inner(deadline, user_id, mailbox, &message, flags)
            .await
    }

    async fn set_flags_inner(
        &self,
        deadline: Deadline,
        user_id: i64,
        mailbox: &Mailbox,
        message: &Message,
        new_flags: Flags,
    ) -> Result<Flags> {
        let mailbox_dir = maildir::mailbox_dir(&self.maildir_root, user_id, &mailbox.name);
        let current_path = maildir::final_path(&mailbox_dir, &message.maildir_key, message.flags);
        maildir::rename_for_flags(&mailbox_dir, &current_path, &message.maildir_key, new_flags)?;

        let message_id = message.id;
        self.with_conn(deadline, move |conn| {
            conn.execute(
                "UPDATE messages SET flags = ?1 WHERE id = ?2",
                params![new_flags.0, message_id],
            )?;
            Ok(())
        })
        .await?;
        Ok(new_flags)
    }

    /// Hard-links the maildir file into `dst_mailbox`, inserts a row with a
    /// freshly assigned UID, and preserves flags (§4.2 CopyMessage).
    pub async fn copy_message(
        &self,
        deadline: Deadline,
        user_id: i64,
        src_mailbox: &Mailbox,
        uid: u32,
        dst_mailbox: &Mailbox,
    ) -> Result<u32> {
        let message = self.load_message(deadline, src_mailbox.id, uid).await?;
        let src_dir = maildir::mailbox_dir(&self.maildir_root, user_id, &src_mailbox.name);
        let dst_dir =
            maildir::ensure_mailbox_dirs(&self.maildir_root, user_id, &dst_mailbox.name)?;
        let src_path = maildir::final_path(&src_dir, &message.maildir_key, message.flags);
        let new_key = maildir::new_key(MAILDIR_HOST);
        let dst_path = maildir::final_path(&dst_dir, &new_key, message.flags);
        std::fs::hard_link(&src_path, &dst_path)?;

        let dst_mailbox_id = dst_mailbox.id;
        let flags = message.flags;
        let size = message.size;
        let internal_date = message.internal_date.to_rfc3339();
        let headers = MessageHeaders {
            message_id: message.message_id.clone(),
            subject: message.subject.clone(),
            from_addr: message.from_addr.clone(),
            to_list: message.to_list.clone(),
            in_reply_to: message.in_reply_to.clone(),
            references: message.references.clone(),
        };
        let key_for_tx = new_key.clone();
        let result = self
            .with_conn(deadline, move |conn| {
                let tx = conn.transaction()?;
                let uid: i64 = tx.query_row(
                    "UPDATE mailboxes SET uid_next = uid_next + 1 WHERE id = ?1 \
                     RETURNING uid_next - 1",
                    params![dst_mailbox_id],
                    |row| row.get(0),
                )?;
                tx.execute(
                    "INSERT INTO messages (mailbox_id, uid, maildir_key, size, internal_date, \
                     flags, message_id, subject, from_addr, to_list, in_reply_to, references_hdr) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        dst_mailbox_id,
                        uid,
                        key_for_tx,
                        size,
                        internal_date,
                        flags.0,
                        headers.message_id,
                        headers.subject,
                        headers.from_addr,
                        headers.to_list,
                        headers.in_reply_to,
                        headers.references,
                    ],
                )?;
                tx.commit()?;
                Ok(uid as u32)
            })
            .await;

        if result.is_err() {
            maildir::rollback_link(&dst_path);
        }
        result
    }

    /// For every `Deleted`-flagged message: unlinks the file, deletes the
    /// row (row-first on the way in, file-first on the way out — M3).
    /// Returns expunged sequence numbers in descending order.
    pub async fn expunge_mailbox(
        &self,
        deadline: Deadline,
        user_id: i64,
        mailbox: &Mailbox,
    ) -> Result<Vec<u32>> {
        let listed = self.list_messages(deadline, mailbox, usize::MAX, 0).await?;
        let mailbox_dir = maildir::mailbox_dir(&self.maildir_root, user_id, &mailbox.name);

        let mut expunged_seqnums = Vec::new();
        let mailbox_id = mailbox.id;
        for (seqnum, message) in listed.iter().enumerate() {
            if !message.flags.contains(Flags::DELETED) {
                continue;
            }
            let message_id = message.id;
            let size = message.size;
            self.with_conn(deadline, move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM messages WHERE id = ?1", params![message_id])?;
                tx.execute(
                    "UPDATE users SET used_bytes = MAX(0, used_bytes - ?1) WHERE id = ?2",
                    params![size, user_id],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;

            let path = maildir::final_path(&mailbox_dir, &message.maildir_key, message.flags);
            maildir::unlink_message(&path)?;

            expunged_seqnums.push((seqnum + 1) as u32);
        }
        expunged_seqnums.reverse();
        Ok(expunged_seqnums)
    }

    /// Returns messages ordered by UID ascending (sequence number is the
    /// 1-based index, §4.2 ListMessages).
    pub async fn list_messages(
        &self,
        deadline: Deadline,
        mailbox: &Mailbox,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>> {
        let mailbox_id = mailbox.id;
        let limit = if limit == usize::MAX { i64::MAX } else { limit as i64 };
        self.with_conn(deadline, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, mailbox_id, uid, maildir_key, size, internal_date, flags, \
                        message_id, subject, from_addr, to_list, in_reply_to, references_hdr \
                 FROM messages WHERE mailbox_id = ?1 ORDER BY uid ASC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![mailbox_id, limit, offset as i64], row_to_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn read_body(&self, user_id: i64, mailbox: &Mailbox, message: &Message) -> Result<Vec<u8>> {
        let dir = maildir::mailbox_dir(&self.maildir_root, user_id, &mailbox.name);
        let path = maildir::final_path(&dir, &message.maildir_key, message.flags);
        maildir::read_message(&path)
    }

    /// Returns UIDs matching `criteria` (§4.2 SearchMessages).
    pub async fn search_messages(
        &self,
        deadline: Deadline,
        mailbox: &Mailbox,
        criteria: SearchCriteria,
    ) -> Result<Vec<u32>> {
        crate::search::search(self, deadline, mailbox, criteria).await
    }

    /// Returns the active Sieve script body for `user_id`, if one is set
    /// (§4.5: exactly one script may be `is_active` per user).
    pub async fn get_active_sieve_script(
        &self,
        deadline: Deadline,
        user_id: i64,
    ) -> Result<Option<String>> {
        self.with_conn(deadline, move |conn| {
            conn.query_row(
                "SELECT content FROM sieve_scripts WHERE user_id = ?1 AND is_active = 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })
        .await
    }

    /// Replaces the named script's content, creating it if absent.
    /// Activating a script deactivates any other script for the user.
    pub async fn put_sieve_script(
        &self,
        deadline: Deadline,
        user_id: i64,
        name: &str,
        content: &str,
        activate: bool,
    ) -> Result<()> {
        let name = name.to_string();
        let content = content.to_string();
        self.with_conn(deadline, move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO sieve_scripts (user_id, name, content, is_active) \
                 VALUES (?1, ?2, ?3, 0) \
                 ON CONFLICT (user_id, name) DO UPDATE SET content = excluded.content",
                params![user_id, name, content],
            )?;
            if activate {
                tx.execute(
                    "UPDATE sieve_scripts SET is_active = 0 WHERE user_id = ?1",
                    params![user_id],
                )?;
                tx.execute(
                    "UPDATE sieve_scripts SET is_active = 1 WHERE user_id = ?1 AND name = ?2",
                    params![user_id, name],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Removes `tmp/` orphans older than `max_age`. Run on an interval by
    /// the embedding process (§4.2 janitor).
    pub async fn run_janitor(&self, max_age: Duration) -> Result<usize> {
        let root = self.maildir_root.clone();
        tokio::task::spawn_blocking(move || maildir::gc_tmp(&root, max_age))
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?
    }
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        domain_id: row.get(1)?,
        local_part: row.get(2)?,
        password_hash: row.get(3)?,
        display_name: row.get(4)?,
        quota_bytes: row.get(5)?,
        used_bytes: row.get(6)?,
        is_admin: row.get::<_, i64>(7)? != 0,
        active: row.get::<_, i64>(8)? != 0,
    })
}

fn row_to_mailbox(row: &rusqlite::Row) -> rusqlite::Result<Mailbox> {
    Ok(Mailbox {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        uid_validity: row.get::<_, i64>(3)? as u32,
        uid_next: row.get::<_, i64>(4)? as u32,
        subscribed: row.get::<_, i64>(5)? != 0,
        special_use: SpecialUse::from_str(&row.get::<_, String>(6)?),
    })
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let internal_date: String = row.get(5)?;
    Ok(Message {
        id: row.get(0)?,
        mailbox_id: row.get(1)?,
        uid: row.get::<_, i64>(2)? as u32,
        maildir_key: row.get(3)?,
        size: row.get(4)?,
        internal_date: DateTime::parse_from_rfc3339(&internal_date)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        flags: Flags(row.get::<_, i64>(6)? as u32),
        message_id: row.get(7)?,
        subject: row.get(8)?,
        from_addr: row.get(9)?,
        to_list: row.get(10)?,
        in_reply_to: row.get(11)?,
        references: row.get(12)?,
    })
}
