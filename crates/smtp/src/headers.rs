/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Minimal RFC 5322 header extraction. Full MIME parsing is out of scope
//! (§1 Non-goals); this reads only the handful of header fields the
//! envelope, storage index, and Sieve evaluator need.

use ahash::AHashMap;
use common::addresses::strip_display_name;
use store::MessageHeaders;

/// Splits `message` at the first CRLFCRLF/LFLF blank line and returns the
/// raw header block.
fn header_block(message: &[u8]) -> &[u8] {
    if let Some(pos) = find_subslice(message, b"\r\n\r\n") {
        &message[..pos]
    } else if let Some(pos) = find_subslice(message, b"\n\n") {
        &message[..pos]
    } else {
        message
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Unfolds continuation lines (leading whitespace) and splits `Name: value`
/// pairs, lower-casing names. Values are returned in document order and
/// accumulated for repeated header names.
pub fn parse_headers(message: &[u8]) -> AHashMap<String, Vec<String>> {
    let block = String::from_utf8_lossy(header_block(message));
    let mut out: AHashMap<String, Vec<String>> = AHashMap::default();
    let mut current: Option<(String, String)> = None;

    for line in block.split(['\n']) {
        let line = line.trim_end_matches('\r');
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = current.as_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = current.take() {
            out.entry(name).or_default().push(value);
        }
        if let Some(idx) = line.find(':') {
            let name = line[..idx].trim().to_lowercase();
            let value = line[idx + 1..].trim().to_string();
            current = Some((name, value));
        }
    }
    if let Some((name, value)) = current.take() {
        out.entry(name).or_default().push(value);
    }
    out
}

fn first<'a>(headers: &'a AHashMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.first()).map(|s| s.as_str())
}

/// Extracts the storage-layer `MessageHeaders` bundle from a raw message.
pub fn extract_message_headers(message: &[u8]) -> MessageHeaders {
    let headers = parse_headers(message);
    MessageHeaders {
        message_id: first(&headers, "message-id").map(str::to_string),
        subject: first(&headers, "subject").map(str::to_string),
        from_addr: first(&headers, "from")
            .map(|v| strip_display_name(v).to_lowercase()),
        to_list: headers.get("to").map(|v| v.join(", ")),
        in_reply_to: first(&headers, "in-reply-to").map(str::to_string),
        references: first(&headers, "references").map(str::to_string),
    }
}

/// Builds the [`sieve::Message`] view the Sieve evaluator consumes.
pub fn extract_sieve_message(message: &[u8], envelope_from: &str, envelope_to: &[String]) -> sieve::Message {
    let headers = parse_headers(message);
    let subject = first(&headers, "subject").unwrap_or_default().to_string();
    sieve::Message {
        from: envelope_from.to_string(),
        to: envelope_to.to_vec(),
        subject,
        headers,
        size: message.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_basic_fields() {
        let msg = b"From: \"Jane\" <jane@example.com>\r\nTo: bob@example.com\r\nSubject: Hi\r\nMessage-ID: <abc@example.com>\r\n\r\nBody text";
        let headers = extract_message_headers(msg);
        assert_eq!(headers.from_addr.as_deref(), Some("jane@example.com"));
        assert_eq!(headers.subject.as_deref(), Some("Hi"));
        assert_eq!(headers.message_id.as_deref(), Some("<abc@example.com>"));
    }

    #[test]
    fn unfolds_continuation_lines() {
        let msg = b"Subject: line one\r\n  continued\r\n\r\nbody";
        let headers = extract_message_headers(msg);
        assert_eq!(headers.subject.as_deref(), Some("line one continued"));
    }
}
