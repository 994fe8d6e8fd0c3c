/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Address normalization shared by the SMTP envelope, the Sieve `address`
//! test, and the greylister's triplet key.

/// Strips a display name and angle brackets from a `From`/`To`-style
/// header value, e.g. `"Jane Doe" <jane@example.com>` -> `jane@example.com`.
pub fn strip_display_name(value: &str) -> &str {
    let value = value.trim();
    if let Some(start) = value.rfind('<') {
        if let Some(end) = value[start..].find('>') {
            return &value[start + 1..start + end];
        }
    }
    value
}

/// Splits an address into local-part/domain at the last `@`, so a quoted
/// local part containing `@` is still handled correctly.
pub fn split_address(address: &str) -> Option<(&str, &str)> {
    let at = address.rfind('@')?;
    Some((&address[..at], &address[at + 1..]))
}

pub fn local_part(address: &str) -> &str {
    split_address(address).map(|(l, _)| l).unwrap_or(address)
}

pub fn domain_part(address: &str) -> &str {
    split_address(address).map(|(_, d)| d).unwrap_or("")
}

pub fn lowercase(address: &str) -> String {
    address.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_display_name() {
        assert_eq!(
            strip_display_name("\"Jane Doe\" <jane@example.com>"),
            "jane@example.com"
        );
        assert_eq!(strip_display_name("jane@example.com"), "jane@example.com");
    }

    #[test]
    fn splits_local_and_domain() {
        assert_eq!(local_part("jane@example.com"), "jane");
        assert_eq!(domain_part("jane@example.com"), "example.com");
        assert_eq!(domain_part("jane@sub@example.com"), "example.com");
        assert_eq!(local_part("jane@sub@example.com"), "jane@sub");
    }
}
