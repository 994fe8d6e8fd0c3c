/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! IMAP command line parser (RFC 3501 subset: the commands named in §4.3 —
//! LIST/LSUB, SELECT/EXAMINE, FETCH, STORE, SEARCH, COPY, APPEND, EXPUNGE,
//! IDLE — plus the session-management commands a client needs around them).
//! Full ABNF conformance (partial BODY sections, CONDSTORE/QRESYNC) is out
//! of scope; literals are read as opaque byte blocks.

use crate::sequence::SequenceSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Capability,
    Login { username: String, password: String },
    Logout,
    Noop,
    StartTls,
    Select(String),
    Examine(String),
    Create(String),
    Delete(String),
    Rename { from: String, to: String },
    Subscribe(String),
    Unsubscribe(String),
    List { reference: String, pattern: String },
    Lsub { reference: String, pattern: String },
    Status { mailbox: String, items: Vec<StatusItem> },
    /// `body` is filled in by the listener after reading the literal; the
    /// parser only produces the mailbox/flags preamble (see
    /// [`ParsedLine::Append`]).
    Append { mailbox: String, flags: Vec<String> },
    Check,
    Close,
    Unselect,
    Expunge,
    Search { criteria: SearchKey, uid: bool },
    Fetch { set: SequenceSet, items: Vec<FetchItem>, uid: bool },
    Store { set: SequenceSet, uid: bool, mode: StoreMode, flags: Vec<String>, silent: bool },
    Copy { set: SequenceSet, uid: bool, mailbox: String },
    Idle,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusItem {
    Messages,
    Recent,
    UidNext,
    UidValidity,
    Unseen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchItem {
    Flags,
    Uid,
    InternalDate,
    Rfc822Size,
    Envelope,
    /// `peek = true` for `BODY.PEEK[...]`: does not set `\Seen` (§4.3).
    Body { peek: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Add,
    Remove,
    Replace,
}

/// Search criteria, structurally the same fields `store::SearchCriteria`
/// consumes plus the flag-presence tests it also supports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchKey {
    pub since: Option<String>,
    pub before: Option<String>,
    pub larger: Option<i64>,
    pub smaller: Option<i64>,
    pub from_contains: Option<String>,
    pub to_contains: Option<String>,
    pub subject_contains: Option<String>,
    pub seen: Option<bool>,
    pub deleted: Option<bool>,
}

/// Either a fully parsed command, or an `APPEND` whose literal payload the
/// caller still needs to read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Command(Command),
    AppendPending { mailbox: String, flags: Vec<String>, literal_len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub message: String,
}

fn err(message: impl Into<String>) -> CommandError {
    CommandError { message: message.into() }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
impl std::error::Error for CommandError {}

/// Splits a command line into whitespace-separated tokens, respecting
/// double-quoted strings and leaving a trailing `{n}` or `{n+}` literal
/// marker as its own token (the caller detects it via
/// [`literal_len`]).
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut tok = String::new();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                tok.push(c);
            }
            tokens.push(tok);
            continue;
        }
        let mut tok = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            tok.push(c);
            chars.next();
        }
        tokens.push(tok);
    }
    tokens
}

/// Parses a trailing `{123}` or `{123+}` literal-length marker.
fn literal_len(tok: &str) -> Option<usize> {
    let inner = tok.strip_prefix('{')?.strip_suffix('}')?;
    let inner = inner.strip_suffix('+').unwrap_or(inner);
    inner.parse().ok()
}

/// Parses one tagged command line (without the tag, already split off by
/// the caller). Returns `ParsedLine::AppendPending` when the line ends in
/// a literal marker, so the listener can read the body before constructing
/// the final `Command::Append`.
pub fn parse_command(verb_and_rest: &str) -> Result<ParsedLine, CommandError> {
    let tokens = tokenize(verb_and_rest);
    let (verb, args) = tokens.split_first().ok_or_else(|| err("empty command"))?;
    match verb.to_ascii_uppercase().as_str() {
        "CAPABILITY" => Ok(ParsedLine::Command(Command::Capability)),
        "NOOP" => Ok(ParsedLine::Command(Command::Noop)),
        "LOGOUT" => Ok(ParsedLine::Command(Command::Logout)),
        "STARTTLS" => Ok(ParsedLine::Command(Command::StartTls)),
        "CHECK" => Ok(ParsedLine::Command(Command::Check)),
        "CLOSE" => Ok(ParsedLine::Command(Command::Close)),
        "UNSELECT" => Ok(ParsedLine::Command(Command::Unselect)),
        "EXPUNGE" => Ok(ParsedLine::Command(Command::Expunge)),
        "IDLE" => Ok(ParsedLine::Command(Command::Idle)),
        "DONE" => Ok(ParsedLine::Command(Command::Done)),
        "LOGIN" => {
            if args.len() != 2 {
                return Err(err("LOGIN requires username and password"));
            }
            Ok(ParsedLine::Command(Command::Login { username: args[0].clone(), password: args[1].clone() }))
        }
        "SELECT" => one_arg(args, "SELECT").map(|m| ParsedLine::Command(Command::Select(m))),
        "EXAMINE" => one_arg(args, "EXAMINE").map(|m| ParsedLine::Command(Command::Examine(m))),
        "CREATE" => one_arg(args, "CREATE").map(|m| ParsedLine::Command(Command::Create(m))),
        "DELETE" => one_arg(args, "DELETE").map(|m| ParsedLine::Command(Command::Delete(m))),
        "SUBSCRIBE" => one_arg(args, "SUBSCRIBE").map(|m| ParsedLine::Command(Command::Subscribe(m))),
        "UNSUBSCRIBE" => one_arg(args, "UNSUBSCRIBE").map(|m| ParsedLine::Command(Command::Unsubscribe(m))),
        "RENAME" => {
            if args.len() != 2 {
                return Err(err("RENAME requires two mailbox names"));
            }
            Ok(ParsedLine::Command(Command::Rename { from: args[0].clone(), to: args[1].clone() }))
        }
        "LIST" => {
            if args.len() != 2 {
                return Err(err("LIST requires reference and pattern"));
            }
            Ok(ParsedLine::Command(Command::List { reference: args[0].clone(), pattern: args[1].clone() }))
        }
        "LSUB" => {
            if args.len() != 2 {
                return Err(err("LSUB requires reference and pattern"));
            }
            Ok(ParsedLine::Command(Command::Lsub { reference: args[0].clone(), pattern: args[1].clone() }))
        }
        "STATUS" => parse_status(args),
        "APPEND" => parse_append(args),
        "SEARCH" => parse_search(args, false),
        "FETCH" => parse_fetch(args, false),
        "STORE" => parse_store(args, false),
        "COPY" => parse_copy(args, false),
        "UID" => parse_uid(args),
        _ => Err(err(format!("unrecognized command: {verb}"))),
    }
}

fn one_arg(args: &[String], name: &str) -> Result<String, CommandError> {
    args.first().cloned().ok_or_else(|| err(format!("{name} requires an argument")))
}

fn parse_status(args: &[String]) -> Result<ParsedLine, CommandError> {
    let mailbox = args.first().cloned().ok_or_else(|| err("STATUS requires a mailbox"))?;
    let list = args.get(1).ok_or_else(|| err("STATUS requires an item list"))?;
    let list = list.trim_start_matches('(').trim_end_matches(')');
    let items = list
        .split_whitespace()
        .map(|tok| match tok.to_ascii_uppercase().as_str() {
            "MESSAGES" => Ok(StatusItem::Messages),
            "RECENT" => Ok(StatusItem::Recent),
            "UIDNEXT" => Ok(StatusItem::UidNext),
            "UIDVALIDITY" => Ok(StatusItem::UidValidity),
            "UNSEEN" => Ok(StatusItem::Unseen),
            other => Err(err(format!("unknown STATUS item: {other}"))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ParsedLine::Command(Command::Status { mailbox, items }))
}

fn parse_append(args: &[String]) -> Result<ParsedLine, CommandError> {
    let mailbox = args.first().cloned().ok_or_else(|| err("APPEND requires a mailbox"))?;
    let mut flags = Vec::new();
    let mut idx = 1;
    if let Some(tok) = args.get(idx) {
        if tok.starts_with('(') {
            let joined = args[idx..].join(" ");
            if let Some(end) = joined.find(')') {
                let inner = &joined[1..end];
                flags = inner.split_whitespace().map(str::to_string).collect();
                // advance idx past the flag-list tokens; cheap approximation
                // since flag atoms never contain whitespace-sensitive content.
                idx += inner.split_whitespace().count();
            }
        }
    }
    let literal_tok = args.get(idx).ok_or_else(|| err("APPEND requires a literal body"))?;
    let len = literal_len(literal_tok).ok_or_else(|| err("APPEND requires a {n} literal"))?;
    Ok(ParsedLine::AppendPending { mailbox, flags, literal_len: len })
}

fn parse_uid(args: &[String]) -> Result<ParsedLine, CommandError> {
    let (sub, rest) = args.split_first().ok_or_else(|| err("UID requires a subcommand"))?;
    match sub.to_ascii_uppercase().as_str() {
        "FETCH" => parse_fetch(rest, true),
        "STORE" => parse_store(rest, true),
        "COPY" => parse_copy(rest, true),
        "SEARCH" => parse_search(rest, true),
        other => Err(err(format!("unsupported UID subcommand: {other}"))),
    }
}

fn parse_fetch(args: &[String], uid: bool) -> Result<ParsedLine, CommandError> {
    let set = args.first().ok_or_else(|| err("FETCH requires a sequence set"))?;
    let set = SequenceSet::parse(set).ok_or_else(|| err("invalid sequence set"))?;
    let rest = args[1..].join(" ");
    let rest = rest.trim_start_matches('(').trim_end_matches(')').to_ascii_uppercase();
    let mut items = Vec::new();
    match rest.as_str() {
        "ALL" => items.extend([FetchItem::Flags, FetchItem::InternalDate, FetchItem::Rfc822Size, FetchItem::Envelope]),
        "FAST" => items.extend([FetchItem::Flags, FetchItem::InternalDate, FetchItem::Rfc822Size]),
        "FULL" => items.extend([
            FetchItem::Flags,
            FetchItem::InternalDate,
            FetchItem::Rfc822Size,
            FetchItem::Envelope,
            FetchItem::Body { peek: true },
        ]),
        _ => {
            for tok in rest.split_whitespace() {
                let item = match tok {
                    "FLAGS" => FetchItem::Flags,
                    "UID" => FetchItem::Uid,
                    "INTERNALDATE" => FetchItem::InternalDate,
                    "RFC822.SIZE" => FetchItem::Rfc822Size,
                    "ENVELOPE" => FetchItem::Envelope,
                    t if t.starts_with("BODY.PEEK") => FetchItem::Body { peek: true },
                    t if t.starts_with("BODY") || t.starts_with("RFC822") => FetchItem::Body { peek: false },
                    other => return Err(err(format!("unknown FETCH item: {other}"))),
                };
                items.push(item);
            }
        }
    }
    if uid && !items.contains(&FetchItem::Uid) {
        items.push(FetchItem::Uid);
    }
    Ok(ParsedLine::Command(Command::Fetch { set, items, uid }))
}

fn parse_store(args: &[String], uid: bool) -> Result<ParsedLine, CommandError> {
    let set = args.first().ok_or_else(|| err("STORE requires a sequence set"))?;
    let set = SequenceSet::parse(set).ok_or_else(|| err("invalid sequence set"))?;
    let mode_tok = args.get(1).ok_or_else(|| err("STORE requires a mode"))?.to_ascii_uppercase();
    let (mode, silent) = match mode_tok.as_str() {
        "FLAGS" => (StoreMode::Replace, false),
        "FLAGS.SILENT" => (StoreMode::Replace, true),
        "+FLAGS" => (StoreMode::Add, false),
        "+FLAGS.SILENT" => (StoreMode::Add, true),
        "-FLAGS" => (StoreMode::Remove, false),
        "-FLAGS.SILENT" => (StoreMode::Remove, true),
        other => return Err(err(format!("unknown STORE mode: {other}"))),
    };
    let rest = args[2..].join(" ");
    let rest = rest.trim_start_matches('(').trim_end_matches(')');
    let flags = rest.split_whitespace().map(str::to_string).collect();
    Ok(ParsedLine::Command(Command::Store { set, uid, mode, flags, silent }))
}

fn parse_copy(args: &[String], uid: bool) -> Result<ParsedLine, CommandError> {
    let set = args.first().ok_or_else(|| err("COPY requires a sequence set"))?;
    let set = SequenceSet::parse(set).ok_or_else(|| err("invalid sequence set"))?;
    let mailbox = args.get(1).cloned().ok_or_else(|| err("COPY requires a target mailbox"))?;
    Ok(ParsedLine::Command(Command::Copy { set, uid, mailbox }))
}

fn parse_search(args: &[String], uid: bool) -> Result<ParsedLine, CommandError> {
    let mut criteria = SearchKey::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].to_ascii_uppercase().as_str() {
            "ALL" => {}
            "SEEN" => criteria.seen = Some(true),
            "UNSEEN" => criteria.seen = Some(false),
            "DELETED" => criteria.deleted = Some(true),
            "UNDELETED" => criteria.deleted = Some(false),
            "SINCE" => {
                i += 1;
                criteria.since = Some(args.get(i).cloned().ok_or_else(|| err("SINCE requires a date"))?);
            }
            "BEFORE" => {
                i += 1;
                criteria.before = Some(args.get(i).cloned().ok_or_else(|| err("BEFORE requires a date"))?);
            }
            "LARGER" => {
                i += 1;
                criteria.larger = Some(
                    args.get(i)
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| err("LARGER requires a number"))?,
                );
            }
            "SMALLER" => {
                i += 1;
                criteria.smaller = Some(
                    args.get(i)
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| err("SMALLER requires a number"))?,
                );
            }
            "FROM" => {
                i += 1;
                criteria.from_contains = Some(args.get(i).cloned().ok_or_else(|| err("FROM requires a value"))?);
            }
            "TO" => {
                i += 1;
                criteria.to_contains = Some(args.get(i).cloned().ok_or_else(|| err("TO requires a value"))?);
            }
            "SUBJECT" => {
                i += 1;
                criteria.subject_contains = Some(args.get(i).cloned().ok_or_else(|| err("SUBJECT requires a value"))?);
            }
            other => return Err(err(format!("unsupported SEARCH key: {other}"))),
        }
        i += 1;
    }
    Ok(ParsedLine::Command(Command::Search { criteria, uid }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_login() {
        let cmd = parse_command("LOGIN alice hunter2").unwrap();
        assert_eq!(cmd, ParsedLine::Command(Command::Login { username: "alice".into(), password: "hunter2".into() }));
    }

    #[test]
    fn parses_quoted_login() {
        let cmd = parse_command(r#"LOGIN "alice" "hunter 2""#).unwrap();
        assert_eq!(cmd, ParsedLine::Command(Command::Login { username: "alice".into(), password: "hunter 2".into() }));
    }

    #[test]
    fn parses_select() {
        assert_eq!(parse_command("SELECT INBOX").unwrap(), ParsedLine::Command(Command::Select("INBOX".into())));
    }

    #[test]
    fn parses_fetch_items() {
        let cmd = parse_command("FETCH 1:3 (FLAGS UID)").unwrap();
        match cmd {
            ParsedLine::Command(Command::Fetch { items, uid: false, .. }) => {
                assert_eq!(items, vec![FetchItem::Flags, FetchItem::Uid]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_uid_fetch() {
        let cmd = parse_command("UID FETCH 1:* (FLAGS)").unwrap();
        assert_eq!(
            cmd,
            ParsedLine::Command(Command::Fetch {
                set: SequenceSet::parse("1:*").unwrap(),
                items: vec![FetchItem::Flags, FetchItem::Uid],
                uid: true,
            })
        );
    }

    #[test]
    fn parses_store_silent() {
        let cmd = parse_command(r#"STORE 1 +FLAGS.SILENT (\Deleted)"#).unwrap();
        assert_eq!(
            cmd,
            ParsedLine::Command(Command::Store {
                set: SequenceSet::parse("1").unwrap(),
                uid: false,
                mode: StoreMode::Add,
                flags: vec![r"\Deleted".to_string()],
                silent: true,
            })
        );
    }

    #[test]
    fn detects_append_literal() {
        let cmd = parse_command("APPEND Sent (\\Seen) {42}").unwrap();
        assert_eq!(
            cmd,
            ParsedLine::AppendPending { mailbox: "Sent".into(), flags: vec![r"\Seen".to_string()], literal_len: 42 }
        );
    }

    #[test]
    fn parses_search_criteria() {
        let cmd = parse_command("SEARCH SUBJECT hello SEEN").unwrap();
        assert_eq!(
            cmd,
            ParsedLine::Command(Command::Search {
                criteria: SearchKey { subject_contains: Some("hello".into()), seen: Some(true), ..Default::default() },
                uid: false,
            })
        );
    }
}
