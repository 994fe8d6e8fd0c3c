/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Queue worker loop (§4.4): pops ready messages, dials the remote MX via an
//! injected [`RemoteDeliverer`], and applies the retry schedule.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use policy::CircuitBreaker;
use trc::{queue::QueueEvent, Collector, EventType, Key};

use super::{backoff::backoff_duration, QueueMessage, QueueStatus, RedisQueue};

/// Outcome of one delivery attempt against a remote MX. The worker never
/// dials SMTP itself; a concrete implementation owns DNS resolution, MX
/// fallback to A/AAAA, and the outbound TLS/SMTP client, the same way
/// [`common::signer::Signer`] stands in for DKIM signing.
#[derive(Debug, Clone)]
pub enum DeliverOutcome {
    Delivered,
    /// Transient failure (connection refused, 4xx, timeout): retry later.
    Transient(String),
    /// Permanent failure (5xx, no MX, bad recipient): never retry.
    Permanent(String),
}

#[async_trait]
pub trait RemoteDeliverer: Send + Sync {
    async fn deliver(&self, message: &QueueMessage) -> DeliverOutcome;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub backoff_jitter_pct: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            poll_interval: Duration::from_secs(5),
            backoff_base: Duration::from_secs(60),
            backoff_max: Duration::from_secs(4 * 3600),
            backoff_jitter_pct: 0.2,
        }
    }
}

/// Runs until `shutdown` fires. Each iteration pops at most one ready
/// message; idle polling backs off to `poll_interval` when the queue is
/// empty or the breaker for the target domain is open.
pub async fn run_worker(
    queue: RedisQueue,
    deliverer: Arc<dyn RemoteDeliverer>,
    breaker: Arc<CircuitBreaker>,
    config: WorkerConfig,
    collector: Arc<dyn Collector>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        match queue.pop_ready().await {
            Ok(Some(message)) => {
                process_one(&queue, &deliverer, &breaker, &config, &collector, message).await;
            }
            Ok(None) => {
                tokio::select! {
                    _ = tokio::time::sleep(config.poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
            Err(e) => {
                collector.record(QueueEvent::RedisError.into_err().reason(e));
                tokio::select! {
                    _ = tokio::time::sleep(config.poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
    }
}

async fn process_one(
    queue: &RedisQueue,
    deliverer: &Arc<dyn RemoteDeliverer>,
    breaker: &Arc<CircuitBreaker>,
    config: &WorkerConfig,
    collector: &Arc<dyn Collector>,
    mut message: QueueMessage,
) {
    if breaker.before_call(&message.domain).is_err() {
        collector.record(
            QueueEvent::CircuitOpen
                .into_err()
                .ctx(Key::Domain, message.domain.clone()),
        );
        message.next_attempt_at = chrono::Utc::now() + chrono::Duration::seconds(30);
        let _ = queue.reschedule(&message).await;
        return;
    }

    message.status = QueueStatus::Sending;
    message.attempts += 1;
    collector.record(
        QueueEvent::AttemptStart
            .into_err()
            .ctx(Key::MessageId, message.id.to_string())
            .ctx(Key::Attempts, message.attempts as u64),
    );

    match deliverer.deliver(&message).await {
        DeliverOutcome::Delivered => {
            breaker.record_success(&message.domain);
            message.status = QueueStatus::Sent;
            collector.record(QueueEvent::Delivered.into_err().ctx(Key::MessageId, message.id.to_string()));
            let _ = queue.mark_sent(&message).await;
        }
        DeliverOutcome::Transient(reason) => {
            breaker.record_failure(&message.domain);
            message.last_error = Some(reason);
            if message.attempts >= message.max_attempts {
                message.status = QueueStatus::Failed;
                collector.record(
                    QueueEvent::Failed
                        .into_err()
                        .ctx(Key::MessageId, message.id.to_string())
                        .ctx(Key::Attempts, message.attempts as u64),
                );
                let _ = queue.mark_failed(&message).await;
            } else {
                message.status = QueueStatus::Retrying;
                let delay = backoff_duration(
                    message.attempts,
                    config.backoff_base,
                    config.backoff_max,
                    config.backoff_jitter_pct,
                );
                message.next_attempt_at =
                    chrono::Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
                collector.record(
                    QueueEvent::Retrying
                        .into_err()
                        .ctx(Key::MessageId, message.id.to_string())
                        .ctx(Key::Attempts, message.attempts as u64),
                );
                let _ = queue.reschedule(&message).await;
            }
        }
        DeliverOutcome::Permanent(reason) => {
            breaker.record_failure(&message.domain);
            message.status = QueueStatus::Failed;
            message.last_error = Some(reason);
            collector.record(
                QueueEvent::Failed
                    .into_err()
                    .ctx(Key::MessageId, message.id.to_string())
                    .ctx(Key::Attempts, message.attempts as u64),
            );
            let _ = queue.mark_failed(&message).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trc::NullCollector;

    struct AlwaysTransient(AtomicUsize);

    #[async_trait]
    impl RemoteDeliverer for AlwaysTransient {
        async fn deliver(&self, _message: &QueueMessage) -> DeliverOutcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            DeliverOutcome::Transient("connection refused".into())
        }
    }

    #[tokio::test]
    async fn transient_failure_reschedules_with_backoff() {
        let deliverer: Arc<dyn RemoteDeliverer> = Arc::new(AlwaysTransient(AtomicUsize::new(0)));
        let breaker = Arc::new(CircuitBreaker::new(Default::default()));
        let collector: Arc<dyn Collector> = Arc::new(NullCollector);
        let config = WorkerConfig::default();

        let mut message = QueueMessage::new(
            "alice@example.com".into(),
            vec!["bob@example.org".into()],
            PathBuf::from("/tmp/does-not-matter"),
            128,
        );
        message.max_attempts = 3;

        let queue_sink = std::sync::Mutex::new(Vec::new());
        let fake_reschedule = |m: QueueMessage| queue_sink.lock().unwrap().push(m);

        match deliverer.deliver(&message).await {
            DeliverOutcome::Transient(reason) => {
                message.attempts += 1;
                message.last_error = Some(reason);
                assert!(message.attempts < message.max_attempts);
                fake_reschedule(message.clone());
            }
            _ => panic!("expected transient outcome"),
        }
        assert_eq!(queue_sink.lock().unwrap().len(), 1);
        let _ = breaker.before_call("example.org");
    }
}
