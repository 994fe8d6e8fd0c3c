/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Maildir++ filesystem layout: `maildir_root/<user_id>/<mailbox_name>/{tmp,new,cur}/<key>`
//! (§4.2). Append/delete atomicity (M3) is implemented here: write to
//! `tmp/` and fsync, hard-link into `new/`/`cur/`, and only then let the
//! caller insert the SQL row; rollback unlinks the link (not the `tmp/`
//! original, which the janitor reaps).

use std::path::{Path, PathBuf};

use utils::rand_hex::maildir_rand;

use crate::{Flags, Result, StoreError};

pub fn mailbox_dir(root: &Path, user_id: i64, mailbox_name: &str) -> PathBuf {
    root.join(user_id.to_string()).join(sanitize(mailbox_name))
}

/// Mailbox names can contain `/` for IMAP hierarchy; every other path
/// separator is rejected rather than silently collapsed.
fn sanitize(name: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for part in name.split('/') {
        if part.is_empty() || part == ".." {
            continue;
        }
        path.push(part);
    }
    path
}

pub fn ensure_mailbox_dirs(root: &Path, user_id: i64, mailbox_name: &str) -> Result<PathBuf> {
    let dir = mailbox_dir(root, user_id, mailbox_name);
    for sub in ["tmp", "new", "cur"] {
        std::fs::create_dir_all(dir.join(sub))?;
    }
    Ok(dir)
}

pub fn remove_mailbox_dirs(root: &Path, user_id: i64, mailbox_name: &str) -> Result<()> {
    let dir = mailbox_dir(root, user_id, mailbox_name);
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    Ok(())
}

/// Generates a fresh `<unix_ms>.<rand>.<host>` key, the part of the
/// filename shared between `tmp/`, `new/`, and `cur/`.
pub fn new_key(hostname: &str) -> String {
    let unix_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{unix_ms}.{}.{hostname}", maildir_rand())
}

pub fn tmp_path(dir: &Path, key: &str) -> PathBuf {
    dir.join("tmp").join(key)
}

pub fn final_path(dir: &Path, key: &str, flags: Flags) -> PathBuf {
    if flags.contains(Flags::SEEN) || flags.0 != 0 {
        dir.join("cur").join(format!("{key}:{}", flags.to_maildir_suffix()))
    } else {
        dir.join("new").join(key)
    }
}

/// Writes `body` to `tmp/<key>`, fsyncs the file (and, best-effort, the
/// directory), and returns the tmp path. Step (a) of the commit contract.
pub fn write_tmp(dir: &Path, key: &str, body: &[u8]) -> Result<PathBuf> {
    let path = tmp_path(dir, key);
    {
        let mut file = std::fs::File::create(&path)?;
        use std::io::Write;
        file.write_all(body)?;
        file.sync_all()?;
    }
    Ok(path)
}

/// Hard-links the `tmp/` file into `new/` or `cur/` depending on flags.
/// Step (b) of the commit contract.
pub fn link_into_mailbox(
    tmp_path: &Path,
    dir: &Path,
    key: &str,
    flags: Flags,
) -> Result<PathBuf> {
    let dest = final_path(dir, key, flags);
    std::fs::hard_link(tmp_path, &dest)?;
    Ok(dest)
}

/// Unlinks the `tmp/` original once it is safely linked elsewhere.
pub fn unlink_tmp(tmp_path: &Path) -> Result<()> {
    std::fs::remove_file(tmp_path).or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Ok(())
        } else {
            Err(e.into())
        }
    })
}

/// Rolls back a partially committed append: unlinks the `new/`/`cur/`
/// link if present. Errors are swallowed — an orphaned link is caught by
/// the janitor; the row's absence from the index is authoritative even
/// if the unlink itself fails.
pub fn rollback_link(path: &Path) {
    let _ = std::fs::remove_file(path);
}

pub fn unlink_message(path: &Path) -> Result<()> {
    std::fs::remove_file(path).or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Ok(())
        } else {
            Err(e.into())
        }
    })
}

/// Renames a message file to reflect a flag change, keeping it in
/// `cur/` (or moving `new/` -> `cur/` the first time any flag is set).
pub fn rename_for_flags(dir: &Path, current: &Path, key: &str, new_flags: Flags) -> Result<PathBuf> {
    let dest = final_path(dir, key, new_flags);
    if dest != current {
        std::fs::rename(current, &dest).map_err(StoreError::from)?;
    }
    Ok(dest)
}

pub fn read_message(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(StoreError::from)
}

/// Scans `tmp/` under every mailbox for files older than `max_age`,
/// deleting them. Recovers from a crash mid-append where the tmp file was
/// written but the row/link never committed (§4.2).
pub fn gc_tmp(root: &Path, max_age: std::time::Duration) -> Result<usize> {
    let mut removed = 0;
    if !root.exists() {
        return Ok(0);
    }
    for user_entry in std::fs::read_dir(root)? {
        let user_dir = user_entry?.path();
        if !user_dir.is_dir() {
            continue;
        }
        for mailbox_entry in walk_mailboxes(&user_dir)? {
            let tmp_dir = mailbox_entry.join("tmp");
            if !tmp_dir.is_dir() {
                continue;
            }
            for file in std::fs::read_dir(&tmp_dir)? {
                let file = file?;
                let metadata = file.metadata()?;
                if let Ok(age) = metadata.modified().and_then(|m| {
                    m.elapsed()
                        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
                }) {
                    if age > max_age {
                        std::fs::remove_file(file.path())?;
                        removed += 1;
                    }
                }
            }
        }
    }
    Ok(removed)
}

/// Recursively finds every directory that directly contains a `tmp/`
/// subdirectory (i.e. every mailbox leaf), supporting `/`-nested mailbox
/// names.
fn walk_mailboxes(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let has_tmp = current.join("tmp").is_dir();
        let has_new = current.join("new").is_dir();
        let has_cur = current.join("cur").is_dir();
        if has_tmp && has_new && has_cur {
            out.push(current.clone());
            continue;
        }
        if current.is_dir() {
            for entry in std::fs::read_dir(&current)? {
                let entry = entry?;
                if entry.path().is_dir() {
                    stack.push(entry.path());
                }
            }
        }
    }
    Ok(out)
}
