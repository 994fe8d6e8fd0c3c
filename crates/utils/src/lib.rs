/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod deadline;
pub mod limiter;
pub mod rand_hex;

pub use deadline::Deadline;
pub use limiter::ConcurrencyLimiter;
