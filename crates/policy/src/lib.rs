/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Cross-cutting policy kernel (C7): greylisting, authentication rate
//! limiting, and the outbound circuit breaker registry. These three pieces
//! share no state with each other; they are grouped here because every
//! other component (SMTP ingress, delivery queue) consults them as a unit
//! before taking action.

pub mod auth_limiter;
pub mod circuit_breaker;
pub mod greylist;

pub use auth_limiter::AuthRateLimiter;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use greylist::Greylister;
