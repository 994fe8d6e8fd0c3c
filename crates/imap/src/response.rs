/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! IMAP response assembly: the tagged/untagged line vocabulary every `op`
//! module builds, plus the handful of formatting helpers (flag atoms,
//! mailbox-name globs, ENVELOPE) shared across them.

use store::{Flags, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::No => "NO",
            Status::Bad => "BAD",
        }
    }
}

/// One untagged (`*`) response line. `Literal` carries a synchronizing
/// literal embedded mid-line (used by `FETCH ... BODY[]`): the wire writer
/// emits `prefix{len}\r\n<bytes>suffix\r\n`.
#[derive(Debug, Clone)]
pub enum UntaggedLine {
    Text(String),
    Literal { prefix: String, bytes: Vec<u8>, suffix: String },
}

impl UntaggedLine {
    pub fn text(s: impl Into<String>) -> Self {
        UntaggedLine::Text(s.into())
    }
}

/// The result of dispatching one command: zero or more untagged lines plus
/// the final tagged completion.
#[derive(Debug, Clone)]
pub struct Response {
    pub untagged: Vec<UntaggedLine>,
    pub status: Status,
    pub text: String,
    /// Set by `IDLE`: the listener enters its idle read loop instead of
    /// reading the next tagged command.
    pub enter_idle: bool,
    /// Set by `LOGOUT`: the listener closes the connection after writing
    /// the tagged response.
    pub close_connection: bool,
    /// Set by a successful `STARTTLS`: the listener performs the TLS
    /// handshake on the underlying stream after writing the tagged response.
    pub upgrade_tls: bool,
}

impl Response {
    pub fn ok(text: impl Into<String>) -> Self {
        Response { untagged: Vec::new(), status: Status::Ok, text: text.into(), enter_idle: false, close_connection: false, upgrade_tls: false }
    }

    pub fn no(text: impl Into<String>) -> Self {
        Response { untagged: Vec::new(), status: Status::No, text: text.into(), enter_idle: false, close_connection: false, upgrade_tls: false }
    }

    pub fn bad(text: impl Into<String>) -> Self {
        Response { untagged: Vec::new(), status: Status::Bad, text: text.into(), enter_idle: false, close_connection: false, upgrade_tls: false }
    }

    pub fn with_untagged_text(mut self, lines: Vec<String>) -> Self {
        self.untagged = lines.into_iter().map(UntaggedLine::Text).collect();
        self
    }

    pub fn with_untagged(mut self, lines: Vec<UntaggedLine>) -> Self {
        self.untagged = lines;
        self
    }

    pub fn push_untagged(&mut self, line: UntaggedLine) {
        self.untagged.push(line);
    }

    pub fn idling(mut self) -> Self {
        self.enter_idle = true;
        self
    }

    pub fn closing(mut self) -> Self {
        self.close_connection = true;
        self
    }

    pub fn upgrading_tls(mut self) -> Self {
        self.upgrade_tls = true;
        self
    }
}

/// Maps an IMAP flag atom (`\Seen`, `\Deleted`, ...) to its bit. `\Recent`
/// has no settable bit (§3 Message) and is rejected like any other unknown
/// atom.
pub fn parse_flag_token(atom: &str) -> Option<u32> {
    match atom {
        r"\Seen" => Some(Flags::SEEN),
        r"\Answered" => Some(Flags::ANSWERED),
        r"\Flagged" => Some(Flags::FLAGGED),
        r"\Draft" => Some(Flags::DRAFT),
        r"\Deleted" => Some(Flags::DELETED),
        _ => None,
    }
}

pub fn flags_to_atoms(flags: Flags) -> Vec<&'static str> {
    let mut out = Vec::new();
    if flags.contains(Flags::ANSWERED) {
        out.push(r"\Answered");
    }
    if flags.contains(Flags::FLAGGED) {
        out.push(r"\Flagged");
    }
    if flags.contains(Flags::DELETED) {
        out.push(r"\Deleted");
    }
    if flags.contains(Flags::SEEN) {
        out.push(r"\Seen");
    }
    if flags.contains(Flags::DRAFT) {
        out.push(r"\Draft");
    }
    if flags.contains(Flags::RECENT) {
        out.push(r"\Recent");
    }
    out
}

pub fn flags_fetch_item(flags: Flags) -> String {
    format!("FLAGS ({})", flags_to_atoms(flags).join(" "))
}

/// Matches an IMAP `LIST`/`LSUB` mailbox-name pattern: `*` matches any
/// sequence of characters, `%` matches any sequence except the hierarchy
/// delimiter `/`.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    fn inner(p: &[u8], n: &[u8]) -> bool {
        match p.first() {
            None => n.is_empty(),
            Some(b'*') => (0..=n.len()).any(|i| inner(&p[1..], &n[i..])),
            Some(b'%') => (0..=n.len())
                .take_while(|&i| n[..i].iter().all(|&c| c != b'/'))
                .any(|i| inner(&p[1..], &n[i..])),
            Some(&c) => !n.is_empty() && n[0] == c && inner(&p[1..], &n[1..]),
        }
    }
    inner(pattern.as_bytes(), name.as_bytes())
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn quote_opt(s: Option<&str>) -> String {
    match s {
        Some(s) if !s.is_empty() => quote(s),
        _ => "NIL".to_string(),
    }
}

/// Builds one RFC 3501 address-list element `((name adl mailbox host))` for
/// a single address, or `NIL` when absent. Only the first address in a
/// comma-separated list is represented — full multi-address ENVELOPE lists
/// are a Non-goal extension.
fn address_list(addr: Option<&str>) -> String {
    match addr.and_then(|a| a.split(',').next()).map(str::trim) {
        None => "NIL".to_string(),
        Some(a) if a.is_empty() => "NIL".to_string(),
        Some(a) => {
            let (local, host) = a.rsplit_once('@').unwrap_or((a, ""));
            format!("((NIL NIL {} {}))", quote(local), quote(host))
        }
    }
}

/// Builds the `ENVELOPE` fetch item body from the columns `append_message`
/// persisted (§4.3 FETCH: "ENVELOPE from stored columns").
pub fn build_envelope(message: &Message) -> String {
    let date = quote(&message.internal_date.to_rfc2822());
    let subject = quote_opt(message.subject.as_deref());
    let from = address_list(message.from_addr.as_deref());
    let to = address_list(message.to_list.as_deref());
    let in_reply_to = quote_opt(message.in_reply_to.as_deref());
    let message_id = quote_opt(message.message_id.as_deref());
    format!("({date} {subject} {from} {from} {from} NIL {to} NIL NIL {in_reply_to} {message_id})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_star_matches_anything() {
        assert!(glob_match("*", "INBOX/Sub"));
        assert!(glob_match("INBOX*", "INBOX/Sub"));
    }

    #[test]
    fn glob_percent_stops_at_delimiter() {
        assert!(glob_match("%", "INBOX"));
        assert!(!glob_match("%", "INBOX/Sub"));
        assert!(glob_match("INBOX/%", "INBOX/Sub"));
    }

    #[test]
    fn flag_round_trip() {
        let mut flags = Flags::empty();
        flags.insert(Flags::SEEN);
        flags.insert(Flags::FLAGGED);
        assert_eq!(flags_to_atoms(flags), vec![r"\Flagged", r"\Seen"]);
    }
}
