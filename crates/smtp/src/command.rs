/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! SMTP command line parser (§6 External Interfaces: RFC 5321 + ESMTP,
//! `STARTTLS`/`AUTH PLAIN`/`AUTH LOGIN`/`PIPELINING`/`SIZE`/`8BITMIME`).
//! Lines arrive already stripped of the trailing CRLF.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Helo(String),
    Ehlo(String),
    MailFrom { address: String, size_hint: Option<u64> },
    RcptTo { address: String },
    Data,
    Rset,
    Noop,
    Quit,
    StartTls,
    AuthPlain { initial: Option<String> },
    AuthLogin,
    AuthContinuation(String),
    Vrfy,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub message: &'static str,
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
impl std::error::Error for CommandError {}

fn err(message: &'static str) -> CommandError {
    CommandError { message }
}

/// Parses one command line. `MAIL FROM`/`RCPT TO` angle-bracketed addresses
/// are unwrapped; the bare `<>` null sender is preserved as an empty string.
pub fn parse_line(line: &str) -> Result<Command, CommandError> {
    let line = line.trim_end_matches("\r\n").trim_end_matches('\n');
    if line.len() > 998 {
        return Err(err("line too long"));
    }
    let (verb, rest) = split_verb(line);
    match verb.to_ascii_uppercase().as_str() {
        "HELO" => Ok(Command::Helo(rest.trim().to_string())),
        "EHLO" => Ok(Command::Ehlo(rest.trim().to_string())),
        "MAIL" => parse_mail_from(rest),
        "RCPT" => parse_rcpt_to(rest),
        "DATA" => Ok(Command::Data),
        "RSET" => Ok(Command::Rset),
        "NOOP" => Ok(Command::Noop),
        "QUIT" => Ok(Command::Quit),
        "STARTTLS" => Ok(Command::StartTls),
        "VRFY" => Ok(Command::Vrfy),
        "HELP" => Ok(Command::Help),
        "AUTH" => parse_auth(rest),
        "" => Err(err("empty command")),
        _ => Err(err("unrecognized command")),
    }
}

/// Parses a bare continuation line sent in response to a `334` challenge
/// (base64 SASL payload, possibly `*` to cancel — rejected upstream).
pub fn parse_auth_continuation(line: &str) -> Command {
    Command::AuthContinuation(line.trim_end_matches("\r\n").trim_end_matches('\n').to_string())
}

fn split_verb(line: &str) -> (&str, &str) {
    match line.find(' ') {
        Some(idx) => (&line[..idx], &line[idx + 1..]),
        None => (line, ""),
    }
}

fn parse_mail_from(rest: &str) -> Result<Command, CommandError> {
    let rest = rest.trim();
    let rest = rest
        .strip_prefix("FROM:")
        .or_else(|| rest.strip_prefix("from:"))
        .ok_or_else(|| err("expected FROM:"))?;
    let (addr_part, params) = split_verb(rest.trim_start());
    let address = extract_angle_addr(addr_part).unwrap_or_default();
    let mut size_hint = None;
    for param in params.split_whitespace() {
        if let Some(value) = param.to_ascii_uppercase().strip_prefix("SIZE=") {
            size_hint = value.parse::<u64>().ok();
        }
    }
    Ok(Command::MailFrom { address, size_hint })
}

fn parse_rcpt_to(rest: &str) -> Result<Command, CommandError> {
    let rest = rest.trim();
    let rest = rest
        .strip_prefix("TO:")
        .or_else(|| rest.strip_prefix("to:"))
        .ok_or_else(|| err("expected TO:"))?;
    let (addr_part, _params) = split_verb(rest.trim_start());
    let address = extract_angle_addr(addr_part).ok_or_else(|| err("expected <address>"))?;
    Ok(Command::RcptTo { address })
}

fn extract_angle_addr(s: &str) -> Option<String> {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        Some(inner.to_string())
    } else if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn parse_auth(rest: &str) -> Result<Command, CommandError> {
    let rest = rest.trim();
    let (mechanism, arg) = split_verb(rest);
    match mechanism.to_ascii_uppercase().as_str() {
        "PLAIN" => Ok(Command::AuthPlain {
            initial: if arg.is_empty() { None } else { Some(arg.trim().to_string()) },
        }),
        "LOGIN" => Ok(Command::AuthLogin),
        _ => Err(err("unsupported AUTH mechanism")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ehlo() {
        assert_eq!(parse_line("EHLO mail.example.com").unwrap(), Command::Ehlo("mail.example.com".into()));
    }

    #[test]
    fn parses_mail_from_with_size() {
        let cmd = parse_line("MAIL FROM:<alice@example.com> SIZE=1024").unwrap();
        assert_eq!(
            cmd,
            Command::MailFrom { address: "alice@example.com".into(), size_hint: Some(1024) }
        );
    }

    #[test]
    fn parses_null_sender() {
        let cmd = parse_line("MAIL FROM:<>").unwrap();
        assert_eq!(cmd, Command::MailFrom { address: String::new(), size_hint: None });
    }

    #[test]
    fn parses_rcpt_to() {
        let cmd = parse_line("RCPT TO:<bob@example.com>").unwrap();
        assert_eq!(cmd, Command::RcptTo { address: "bob@example.com".into() });
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!(parse_line("BOGUS foo").is_err());
    }

    #[test]
    fn parses_auth_plain_with_initial_response() {
        let cmd = parse_line("AUTH PLAIN AGFsaWNlAHNlY3JldA==").unwrap();
        assert_eq!(
            cmd,
            Command::AuthPlain { initial: Some("AGFsaWNlAHNlY3JldA==".into()) }
        );
    }

    #[test]
    fn rejects_overlong_line() {
        let line = "MAIL FROM:<".to_string() + &"a".repeat(1000) + ">";
        assert!(parse_line(&line).is_err());
    }
}
