/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Typed configuration surface. Parsing TOML/YAML/env into these structs is
//! the named external collaborator ("configuration file parsing", §1); this
//! module only defines the tunables every component consults and their
//! spec-mandated defaults.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub smtp: SmtpConfig,
    pub imap: ImapConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub greylist: GreylistConfig,
    pub auth_limiter: AuthLimiterConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub sieve: SieveLimits,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            smtp: SmtpConfig::default(),
            imap: ImapConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            greylist: GreylistConfig::default(),
            auth_limiter: AuthLimiterConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            sieve: SieveLimits::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub max_message_size: usize,
    pub max_recipients: usize,
    pub max_bad_commands: usize,
    pub require_tls_submission: bool,
    pub mx_port: u16,
    pub submission_port: u16,
    pub submission_tls_port: u16,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        SmtpConfig {
            max_message_size: 25 * 1024 * 1024,
            max_recipients: 100,
            max_bad_commands: 10,
            require_tls_submission: true,
            mx_port: 25,
            submission_port: 587,
            submission_tls_port: 465,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub port: u16,
    pub tls_port: u16,
    pub idle_timeout: Duration,
}

impl Default for ImapConfig {
    fn default() -> Self {
        ImapConfig {
            port: 143,
            tls_port: 993,
            idle_timeout: Duration::from_secs(29 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub maildir_root: std::path::PathBuf,
    pub sqlite_path: std::path::PathBuf,
    pub tmp_gc_age: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            maildir_root: std::path::PathBuf::from("/var/mail"),
            sqlite_path: std::path::PathBuf::from("/var/mail/index.sqlite3"),
            tmp_gc_age: Duration::from_secs(36 * 3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_pct: f64,
    pub batch_max_bytes: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            max_attempts: 5,
            base_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(3600),
            jitter_pct: 0.20,
            batch_max_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GreylistConfig {
    pub min_delay: Duration,
    pub max_age: Duration,
}

impl Default for GreylistConfig {
    fn default() -> Self {
        GreylistConfig {
            min_delay: Duration::from_secs(5 * 60),
            max_age: Duration::from_secs(35 * 24 * 3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthLimiterConfig {
    pub window_size: Duration,
    pub max_attempts: u32,
    pub block_duration: Duration,
}

impl Default for AuthLimiterConfig {
    fn default() -> Self {
        AuthLimiterConfig {
            window_size: Duration::from_secs(15 * 60),
            max_attempts: 5,
            block_duration: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            half_open_max_calls: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SieveLimits {
    pub max_script_size: usize,
    pub max_array_elements: usize,
    pub max_condition_depth: usize,
    pub max_vacation_days: u32,
}

impl Default for SieveLimits {
    fn default() -> Self {
        SieveLimits {
            max_script_size: 1024 * 1024,
            max_array_elements: 1000,
            max_condition_depth: 32,
            max_vacation_days: 365,
        }
    }
}
