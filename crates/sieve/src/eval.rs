/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Evaluates a parsed [`Script`] against a [`Message`] (§4.5). Header
//! matching is case-insensitive by default; `:matches` compiles the glob
//! pattern into an anchored regex once per test.

use ahash::AHashMap;
use regex::Regex;

use crate::ast::{Action, AddressPart, MatchType, Script, Stmt, Test};

/// The subset of a message the Sieve engine needs. Full MIME parsing is out
/// of scope; callers extract these fields once before evaluation.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub headers: AHashMap<String, Vec<String>>,
    pub size: u64,
}

impl Message {
    pub fn header(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// Runs `script` against `message`, returning the ordered list of actions
/// to perform. A `stop` halts evaluation immediately. If no action that
/// counts as explicit filing ran, an implicit `keep` is appended.
pub fn evaluate(script: &Script, message: &Message) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut stopped = false;
    run_block(&script.body, message, &mut actions, &mut stopped);

    let filed = actions.iter().any(|a| {
        matches!(
            a,
            Action::Keep | Action::FileInto(_) | Action::Discard | Action::Reject(_) | Action::Redirect(_)
        )
    });
    if !filed {
        actions.push(Action::Keep);
    }
    actions
}

fn run_block(stmts: &[Stmt], message: &Message, actions: &mut Vec<Action>, stopped: &mut bool) {
    for stmt in stmts {
        if *stopped {
            break;
        }
        match stmt {
            Stmt::Do(action) => {
                if matches!(action, Action::Stop) {
                    *stopped = true;
                }
                actions.push(action.clone());
            }
            Stmt::If { branches, otherwise } => {
                let mut matched = false;
                for (test, block) in branches {
                    if eval_test(test, message) {
                        run_block(block, message, actions, stopped);
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    if let Some(block) = otherwise {
                        run_block(block, message, actions, stopped);
                    }
                }
            }
        }
    }
}

fn eval_test(test: &Test, message: &Message) -> bool {
    match test {
        Test::True => true,
        Test::False => false,
        Test::Not(inner) => !eval_test(inner, message),
        Test::AllOf(tests) => tests.iter().all(|t| eval_test(t, message)),
        Test::AnyOf(tests) => tests.iter().any(|t| eval_test(t, message)),
        Test::Size { over, limit } => {
            if *over {
                message.size > *limit
            } else {
                message.size < *limit
            }
        }
        Test::Exists { headers } => headers.iter().all(|h| !message.header(h).is_empty()),
        Test::Header {
            names,
            match_type,
            keys,
        } => names.iter().any(|name| {
            message
                .header(name)
                .iter()
                .any(|value| keys.iter().any(|key| match_value(match_type, value, key)))
        }),
        Test::Address {
            part,
            header,
            match_type,
            keys,
        } => {
            let values: Vec<&String> = if header.eq_ignore_ascii_case("from") {
                std::iter::once(&message.from).collect()
            } else if header.eq_ignore_ascii_case("to") {
                message.to.iter().collect()
            } else {
                message.header(header).iter().collect()
            };
            values.iter().any(|raw| {
                let extracted = extract_address_part(raw, part);
                keys.iter().any(|key| match_value(match_type, &extracted, key))
            })
        }
    }
}

fn match_value(match_type: &MatchType, value: &str, key: &str) -> bool {
    match match_type {
        MatchType::Is => value.eq_ignore_ascii_case(key),
        MatchType::Contains => value.to_lowercase().contains(&key.to_lowercase()),
        MatchType::Matches => glob_matches(value, key),
    }
}

/// Extracts the local-part/domain/whole address from a `Display Name
/// <user@host>` style header value, splitting at the last `@` (§4.5).
fn extract_address_part(raw: &str, part: &AddressPart) -> String {
    let addr = raw
        .rfind('<')
        .and_then(|start| raw[start..].find('>').map(|end| &raw[start + 1..start + end]))
        .unwrap_or(raw)
        .trim();
    match part {
        AddressPart::All => addr.to_string(),
        AddressPart::LocalPart => addr.rsplit_once('@').map(|(l, _)| l).unwrap_or(addr).to_string(),
        AddressPart::Domain => addr.rsplit_once('@').map(|(_, d)| d).unwrap_or("").to_string(),
    }
}

/// Compiles a `*`/`?` glob into an anchored, case-insensitive regex.
fn glob_matches(value: &str, pattern: &str) -> bool {
    let mut anchored = String::from("(?i)^");
    for c in pattern.chars() {
        match c {
            '*' => anchored.push_str(".*"),
            '?' => anchored.push('.'),
            c => anchored.push_str(&regex::escape(&c.to_string())),
        }
    }
    anchored.push('$');
    Regex::new(&anchored).map(|re| re.is_match(value)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, SieveLimits};

    fn msg(subject: &str) -> Message {
        let mut headers = AHashMap::default();
        headers.insert("subject".to_string(), vec![subject.to_string()]);
        Message {
            from: "sender@example.com".into(),
            to: vec!["user@local".into()],
            subject: subject.into(),
            headers,
            size: 1024,
        }
    }

    #[test]
    fn fileinto_on_subject_contains() {
        let script = parse(
            r#"require ["fileinto"]; if header :contains "subject" "invoice" { fileinto "Bills"; stop; }"#,
            SieveLimits::default(),
        )
        .unwrap();
        let actions = evaluate(&script, &msg("Your Invoice"));
        assert_eq!(
            actions,
            vec![Action::FileInto("Bills".into()), Action::Stop]
        );
    }

    #[test]
    fn implicit_keep_when_no_match() {
        let script = parse(
            r#"if header :contains "subject" "invoice" { discard; }"#,
            SieveLimits::default(),
        )
        .unwrap();
        let actions = evaluate(&script, &msg("Hello"));
        assert_eq!(actions, vec![Action::Keep]);
    }

    #[test]
    fn glob_matches_is_anchored() {
        assert!(glob_matches("invoice-2024.pdf", "invoice-*.pdf"));
        assert!(!glob_matches("not-invoice-2024.pdf", "invoice-*.pdf"));
    }

    #[test]
    fn address_localpart_extraction() {
        assert_eq!(
            extract_address_part("Jane Doe <jane@example.com>", &AddressPart::LocalPart),
            "jane"
        );
        assert_eq!(
            extract_address_part("jane@example.com", &AddressPart::Domain),
            "example.com"
        );
    }
}
