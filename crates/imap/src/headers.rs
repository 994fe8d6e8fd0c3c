/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Minimal RFC 5322 header extraction for `APPEND` bodies. Mirrors the SMTP
//! ingress pipeline's header reader, trimmed to the fields the storage index
//! persists (full MIME parsing is out of scope).

use ahash::AHashMap;
use store::MessageHeaders;

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

fn parse_headers(message: &[u8]) -> AHashMap<String, Vec<String>> {
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

pub fn extract_message_headers(message: &[u8]) -> MessageHeaders {
    let headers = parse_headers(message);
    MessageHeaders {
        message_id: first(&headers, "message-id").map(str::to_string),
        subject: first(&headers, "subject").map(str::to_string),
        from_addr: first(&headers, "from").map(str::to_string),
        to_list: headers.get("to").map(|v| v.join(", ")),
        in_reply_to: first(&headers, "in-reply-to").map(str::to_string),
        references: first(&headers, "references").map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_basic_fields() {
        let msg = b"From: jane@example.com\r\nTo: bob@example.com\r\nSubject: Hi\r\n\r\nBody";
        let headers = extract_message_headers(msg);
        assert_eq!(headers.subject.as_deref(), Some("Hi"));
        assert_eq!(headers.from_addr.as_deref(), Some("jane@example.com"));
    }
}
