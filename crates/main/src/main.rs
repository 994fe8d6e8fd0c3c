/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Process entry point: constructs a [`Config`] (parsing one from disk is an
//! external collaborator, §1), opens storage, wires the policy kernel, and
//! spawns every listener/worker on its own task until `Ctrl-C` fires.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use common::config::Config;
use common::tls::build_acceptor;
use common::Core;
use directory::Directory;
use imap::idle::IdleRegistry;
use policy::{AuthRateLimiter, CircuitBreaker, Greylister};
use smtp::ingress::Ingress;
use smtp::profile::Profile;
use smtp::queue::{run_worker, DeliverOutcome, QueueMessage, RedisQueue, RemoteDeliverer, WorkerConfig};
use store::janitor::{self, JanitorConfig};
use store::Store;
use trc::{Collector, Error, Level};

/// Prints events to stdout. Real wiring (OTLP, journald) is an external
/// collaborator; this is enough to observe a running process.
struct StdoutCollector;

impl Collector for StdoutCollector {
    fn record(&self, event: Error) {
        let prefix = match event.level {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };
        println!("[{prefix}] {event}");
    }
}

/// Stands in for the external MX-dialing collaborator (§4.4): no DNS
/// resolution or outbound SMTP client exists in this workspace, so every
/// delivery attempt is reported transient and retried on the normal
/// backoff schedule until a real implementation is plugged in.
struct UnimplementedDeliverer;

#[async_trait::async_trait]
impl RemoteDeliverer for UnimplementedDeliverer {
    async fn deliver(&self, _message: &QueueMessage) -> DeliverOutcome {
        DeliverOutcome::Transient("outbound SMTP client not configured".into())
    }
}

fn auth_limiter_config(c: &common::config::AuthLimiterConfig) -> policy::auth_limiter::AuthLimiterConfig {
    policy::auth_limiter::AuthLimiterConfig {
        window_size: c.window_size,
        max_attempts: c.max_attempts,
        block_duration: c.block_duration,
    }
}

fn greylist_config(c: &common::config::GreylistConfig) -> policy::greylist::GreylistConfig {
    policy::greylist::GreylistConfig { min_delay: c.min_delay }
}

fn circuit_breaker_config(c: &common::config::CircuitBreakerConfig) -> policy::circuit_breaker::CircuitBreakerConfig {
    policy::circuit_breaker::CircuitBreakerConfig {
        failure_threshold: c.failure_threshold,
        success_threshold: c.success_threshold,
        timeout: c.timeout,
        half_open_max_calls: c.half_open_max_calls,
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let collector: Arc<dyn Collector> = Arc::new(StdoutCollector);
    let config = Config::default();

    let store = Store::open(config.storage.sqlite_path.clone(), config.storage.maildir_root.clone())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let directory = Arc::new(Directory::new(store.clone()));
    let core = Arc::new(Core::new(config, store.clone(), directory));

    let auth_limiter = Arc::new(AuthRateLimiter::new(auth_limiter_config(&core.config.auth_limiter)));
    let greylister = Arc::new(Greylister::new(store.clone(), greylist_config(&core.config.greylist)));
    let circuit_breaker = Arc::new(CircuitBreaker::new(circuit_breaker_config(&core.config.circuit_breaker)));
    let ingress = Arc::new(Ingress::new(core.clone(), greylister));
    let idle = Arc::new(IdleRegistry::new());

    let tls_acceptor = match (std::env::var("MAIL_TLS_CERT"), std::env::var("MAIL_TLS_KEY")) {
        (Ok(cert_path), Ok(key_path)) => {
            let cert_pem = std::fs::read(cert_path)?;
            let key_pem = std::fs::read(key_path)?;
            Some(Arc::new(build_acceptor(&cert_pem, &key_pem)?))
        }
        _ => None,
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let spool_dir = PathBuf::from("/var/mail/spool");
    std::fs::create_dir_all(&spool_dir)?;

    let redis_url = std::env::var("MAIL_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
    let queue = Arc::new(
        RedisQueue::connect(&redis_url)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?,
    );

    let mut tasks = Vec::new();

    // SMTP: MX (25), submission plaintext/STARTTLS (587), submission implicit TLS (465).
    let mx_config = smtp::ListenerConfig {
        addr: SocketAddr::from(([0, 0, 0, 0], core.config.smtp.mx_port)),
        profile: Profile::Mx,
        max_recipients: core.config.smtp.max_recipients,
        max_bad_commands: core.config.smtp.max_bad_commands,
        max_message_size: core.config.smtp.max_message_size,
        require_tls_submission: false,
        max_connections: 1024,
        spool_dir: spool_dir.clone(),
        queue: Some(queue.clone()),
        auth_limiter: auth_limiter.clone(),
        tls_acceptor: tls_acceptor.clone(),
        implicit_tls: false,
    };
    tasks.push(spawn_listener(smtp::listener::run(mx_config, core.clone(), ingress.clone(), collector.clone(), shutdown_rx.clone())));

    let submission_config = smtp::ListenerConfig {
        addr: SocketAddr::from(([0, 0, 0, 0], core.config.smtp.submission_port)),
        profile: Profile::Submission,
        max_recipients: core.config.smtp.max_recipients,
        max_bad_commands: core.config.smtp.max_bad_commands,
        max_message_size: core.config.smtp.max_message_size,
        require_tls_submission: core.config.smtp.require_tls_submission,
        max_connections: 1024,
        spool_dir: spool_dir.clone(),
        queue: Some(queue.clone()),
        auth_limiter: auth_limiter.clone(),
        tls_acceptor: tls_acceptor.clone(),
        implicit_tls: false,
    };
    tasks.push(spawn_listener(smtp::listener::run(submission_config, core.clone(), ingress.clone(), collector.clone(), shutdown_rx.clone())));

    if tls_acceptor.is_some() {
        let submission_tls_config = smtp::ListenerConfig {
            addr: SocketAddr::from(([0, 0, 0, 0], core.config.smtp.submission_tls_port)),
            profile: Profile::Submission,
            max_recipients: core.config.smtp.max_recipients,
            max_bad_commands: core.config.smtp.max_bad_commands,
            max_message_size: core.config.smtp.max_message_size,
            require_tls_submission: core.config.smtp.require_tls_submission,
            max_connections: 1024,
            spool_dir: spool_dir.clone(),
            queue: Some(queue.clone()),
            auth_limiter: auth_limiter.clone(),
            tls_acceptor: tls_acceptor.clone(),
            implicit_tls: true,
        };
        tasks.push(spawn_listener(smtp::listener::run(submission_tls_config, core.clone(), ingress.clone(), collector.clone(), shutdown_rx.clone())));
    }

    // IMAP: plaintext/STARTTLS (143), implicit TLS (993).
    let imap_config = imap::ListenerConfig {
        addr: SocketAddr::from(([0, 0, 0, 0], core.config.imap.port)),
        max_connections: 1024,
        idle_timeout: core.config.imap.idle_timeout,
        auth_limiter: auth_limiter.clone(),
        tls_acceptor: tls_acceptor.clone(),
        implicit_tls: false,
    };
    tasks.push(spawn_listener(imap::listener::run(imap_config, core.clone(), idle.clone(), collector.clone(), shutdown_rx.clone())));

    if tls_acceptor.is_some() {
        let imap_tls_config = imap::ListenerConfig {
            addr: SocketAddr::from(([0, 0, 0, 0], core.config.imap.tls_port)),
            max_connections: 1024,
            idle_timeout: core.config.imap.idle_timeout,
            auth_limiter: auth_limiter.clone(),
            tls_acceptor: tls_acceptor.clone(),
            implicit_tls: true,
        };
        tasks.push(spawn_listener(imap::listener::run(imap_tls_config, core.clone(), idle.clone(), collector.clone(), shutdown_rx.clone())));
    }

    // Outbound delivery queue worker.
    let deliverer: Arc<dyn RemoteDeliverer> = Arc::new(UnimplementedDeliverer);
    let worker_config = WorkerConfig {
        poll_interval: std::time::Duration::from_secs(5),
        backoff_base: core.config.queue.base_backoff,
        backoff_max: core.config.queue.max_backoff,
        backoff_jitter_pct: core.config.queue.jitter_pct,
    };
    let worker_queue = (*queue).clone();
    tasks.push(tokio::spawn(run_worker(worker_queue, deliverer, circuit_breaker, worker_config, collector.clone(), shutdown_rx.clone())));

    // Maildir tmp/ and greylist janitor.
    let janitor_config = JanitorConfig {
        tmp_max_age: core.config.storage.tmp_gc_age,
        sweep_interval: std::time::Duration::from_secs(15 * 60),
        greylist_max_age: core.config.greylist.max_age,
    };
    let janitor_shutdown = janitor::spawn(store, janitor_config, collector.clone());

    collector.record(Error::new("server_start", Level::Info));

    tokio::signal::ctrl_c().await?;
    collector.record(Error::new("server_shutdown", Level::Info));
    let _ = shutdown_tx.send(true);
    let _ = janitor_shutdown.send(true);

    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}

/// Spawns a listener future, discarding its `io::Result` so every task
/// handle in `tasks` shares the same `JoinHandle<()>` type. Errors are
/// already reported through the collector before a listener returns.
fn spawn_listener(
    fut: impl std::future::Future<Output = std::io::Result<()>> + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let _ = fut.await;
    })
}
