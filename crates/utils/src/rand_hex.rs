/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use rand::RngCore;

/// 32 random bytes rendered as a 64-character lowercase hex string, used
/// for admin session tokens (§3 Session).
pub fn session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// `<rand>` component of a Maildir++ filename key.
pub fn maildir_rand() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
