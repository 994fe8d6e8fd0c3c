/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! TCP accept loop and per-connection I/O driver (§4.1, §5). Parses command
//! lines off the wire, drives [`Session`], and calls into [`Ingress`] on the
//! final DATA dot. TLS is negotiated with `rustls` directly on 465/993 and
//! on demand via `STARTTLS`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::tls::{MaybeTlsStream, TlsAcceptor};
use common::Core;
use directory::{Credentials, DirectoryError, QueryParams};
use policy::AuthRateLimiter;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use trc::{Collector, EventType, Key, SmtpEvent};
use utils::limiter::ConcurrencyLimiter;
use utils::Deadline;

use crate::command::{self, Command};
use crate::ingress::Ingress;
use crate::profile::Profile;
use crate::queue::RedisQueue;
use crate::session::{Session, SessionError, State};

pub struct ListenerConfig {
    pub addr: SocketAddr,
    pub profile: Profile,
    pub max_recipients: usize,
    pub max_bad_commands: usize,
    pub max_message_size: usize,
    pub require_tls_submission: bool,
    pub max_connections: usize,
    /// Where accepted submission messages are spooled before the outbound
    /// queue picks them up (§4.4). Unused on the MX profile.
    pub spool_dir: PathBuf,
    /// Outbound queue handle. `None` disables enqueue (e.g. a test listener
    /// that only exercises MX delivery).
    pub queue: Option<Arc<RedisQueue>>,
    pub auth_limiter: Arc<AuthRateLimiter>,
    /// `STARTTLS` upgrades the plaintext connection in place using this
    /// acceptor. `None` disables `STARTTLS` (it is still advertised only
    /// when set; see [`write_ehlo_reply`]).
    pub tls_acceptor: Option<Arc<TlsAcceptor>>,
    /// When `true`, every accepted connection is wrapped in TLS before the
    /// session state machine sees a byte (implicit TLS, port 465).
    /// Requires `tls_acceptor` to be set.
    pub implicit_tls: bool,
}

/// Where in the `AUTH` challenge/response exchange this connection is.
/// Tracked outside [`Session`] because it is pure wire-protocol state, not
/// part of the §4.1 transition table.
enum AuthStage {
    None,
    AwaitingPlainResponse,
    AwaitingLoginUsername,
    AwaitingLoginPassword { username: String },
}

/// Runs the accept loop until `shutdown` fires. Each connection is handled
/// on its own task (§5: "each accepted SMTP/IMAP connection runs on its own
/// logical task").
pub async fn run(
    config: ListenerConfig,
    core: Arc<Core>,
    ingress: Arc<Ingress>,
    collector: Arc<dyn Collector>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.addr).await?;
    let limiter = Arc::new(ConcurrencyLimiter::new(config.max_connections));
    let max_recipients = config.max_recipients;
    let max_bad_commands = config.max_bad_commands;
    let max_message_size = config.max_message_size;
    let require_tls = config.require_tls_submission;
    let profile = config.profile;
    let spool_dir = Arc::new(config.spool_dir.clone());
    let queue = config.queue.clone();
    let auth_limiter = config.auth_limiter.clone();
    let tls_acceptor = config.tls_acceptor.clone();
    let implicit_tls = config.implicit_tls;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted?;
                let Some(guard) = limiter.try_acquire() else {
                    drop(stream);
                    continue;
                };
                let core = core.clone();
                let ingress = ingress.clone();
                let collector = collector.clone();
                let spool_dir = spool_dir.clone();
                let queue = queue.clone();
                let auth_limiter = auth_limiter.clone();
                let tls_acceptor = tls_acceptor.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    collector.record(SmtpEvent::ConnectionStart.into_err().ctx(Key::RemoteIp, peer_addr.ip().to_string()));
                    let (stream, tls_active) = if implicit_tls {
                        let Some(acceptor) = tls_acceptor.as_deref() else {
                            collector.record(SmtpEvent::Error.into_err().reason("implicit TLS listener has no acceptor configured"));
                            return;
                        };
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => (MaybeTlsStream::Tls(Box::new(tls_stream)), true),
                            Err(e) => {
                                collector.record(SmtpEvent::Error.into_err().reason(e.to_string()));
                                return;
                            }
                        }
                    } else {
                        (MaybeTlsStream::Plain(stream), false)
                    };
                    if let Err(e) = handle_connection(
                        stream,
                        tls_active,
                        peer_addr,
                        profile,
                        core,
                        ingress,
                        max_recipients,
                        max_bad_commands,
                        max_message_size,
                        require_tls,
                        &spool_dir,
                        queue,
                        auth_limiter,
                        tls_acceptor,
                    )
                    .await
                    {
                        collector.record(SmtpEvent::Error.into_err().reason(e.to_string()));
                    }
                    collector.record(SmtpEvent::ConnectionEnd.into_err().ctx(Key::RemoteIp, peer_addr.ip().to_string()));
                });
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_connection(
    stream: MaybeTlsStream,
    tls_active: bool,
    peer_addr: SocketAddr,
    profile: Profile,
    core: Arc<Core>,
    ingress: Arc<Ingress>,
    max_recipients: usize,
    max_bad_commands: usize,
    max_message_size: usize,
    require_tls: bool,
    spool_dir: &std::path::Path,
    queue: Option<Arc<RedisQueue>>,
    auth_limiter: Arc<AuthRateLimiter>,
    tls_acceptor: Option<Arc<TlsAcceptor>>,
) -> std::io::Result<()> {
    let mut session = Session::new(profile, peer_addr.ip(), max_recipients, max_bad_commands);
    session.tls_active = tls_active;
    let mut reader = BufReader::new(stream);
    let mut auth_stage = AuthStage::None;

    reader
        .get_mut()
        .write_all(b"220 mail.example.com ESMTP\r\n")
        .await?;

    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(());
        }

        if !matches!(auth_stage, AuthStage::None) {
            let continuation = command::parse_auth_continuation(&line);
            handle_auth_continuation(
                &mut reader,
                &mut session,
                &mut auth_stage,
                continuation,
                &core,
                &auth_limiter,
                peer_addr,
            )
            .await?;
            continue;
        }

        let command = match command::parse_line(&line) {
            Ok(command) => command,
            Err(_) => {
                if session.record_bad_command().is_err() {
                    reader
                        .get_mut()
                        .write_all(b"421 4.7.0 too many errors\r\n")
                        .await?;
                    return Ok(());
                }
                reader.get_mut().write_all(b"500 5.5.2 syntax error\r\n").await?;
                continue;
            }
        };

        match command {
            Command::Quit => {
                reader.get_mut().write_all(b"221 2.0.0 bye\r\n").await?;
                return Ok(());
            }
            Command::Ehlo(_) | Command::Helo(_) => {
                session.on_ehlo().ok();
                write_ehlo_reply(&mut reader, &session, max_message_size, require_tls, tls_acceptor.is_some()).await?;
            }
            Command::StartTls => {
                let Some(acceptor) = tls_acceptor.as_ref() else {
                    reader.get_mut().write_all(b"454 4.7.0 TLS not available\r\n").await?;
                    continue;
                };
                match session.on_starttls() {
                    Ok(()) => {
                        reader.get_mut().write_all(b"220 2.0.0 ready to start TLS\r\n").await?;
                        // RFC 3207: the client must wait for this reply before
                        // sending its ClientHello, so the buffer is empty here.
                        let plain = reader.into_inner().into_plain().expect("session was not yet TLS");
                        let tls_stream = acceptor.accept(plain).await?;
                        reader = BufReader::new(MaybeTlsStream::Tls(Box::new(tls_stream)));
                    }
                    Err(e) => write_session_error(&mut reader, e).await?,
                }
            }
            Command::AuthPlain { initial } => {
                if !session.auth_allowed(require_tls) {
                    reader
                        .get_mut()
                        .write_all(b"538 5.7.11 encryption required for requested authentication mechanism\r\n")
                        .await?;
                    continue;
                }
                if auth_limiter.is_blocked(peer_addr.ip()) {
                    reader.get_mut().write_all(b"454 4.7.0 too many authentication failures\r\n").await?;
                    continue;
                }
                match initial {
                    Some(payload) => {
                        complete_plain_auth(&mut reader, &mut session, &core, &auth_limiter, peer_addr, &payload).await?;
                    }
                    None => {
                        reader.get_mut().write_all(b"334 \r\n").await?;
                        auth_stage = AuthStage::AwaitingPlainResponse;
                    }
                }
            }
            Command::AuthLogin => {
                if !session.auth_allowed(require_tls) {
                    reader
                        .get_mut()
                        .write_all(b"538 5.7.11 encryption required for requested authentication mechanism\r\n")
                        .await?;
                    continue;
                }
                if auth_limiter.is_blocked(peer_addr.ip()) {
                    reader.get_mut().write_all(b"454 4.7.0 too many authentication failures\r\n").await?;
                    continue;
                }
                let prompt = format!("334 {}\r\n", STANDARD.encode("Username:"));
                reader.get_mut().write_all(prompt.as_bytes()).await?;
                auth_stage = AuthStage::AwaitingLoginUsername;
            }
            Command::MailFrom { address, .. } => match session.on_mail_from(address) {
                Ok(()) => reader.get_mut().write_all(b"250 2.1.0 ok\r\n").await?,
                Err(e) => write_session_error(&mut reader, e).await?,
            },
            Command::RcptTo { address } => {
                // MX profile: recipient must resolve to a local mailbox
                // (§4.1). Submission profile: recipients are the outbound
                // targets and are never checked against the directory here.
                if profile.requires_local_recipient() {
                    let deadline = Deadline::after(std::time::Duration::from_secs(30));
                    match ingress.validate_recipient(deadline, &address).await {
                        Ok(resolved) => match session.on_rcpt_to(resolved) {
                            Ok(()) => reader.get_mut().write_all(b"250 2.1.5 ok\r\n").await?,
                            Err(e) => write_session_error(&mut reader, e).await?,
                        },
                        Err(_) => reader.get_mut().write_all(b"550 5.1.1 user unknown\r\n").await?,
                    }
                } else {
                    match session.on_rcpt_to(address) {
                        Ok(()) => reader.get_mut().write_all(b"250 2.1.5 ok\r\n").await?,
                        Err(e) => write_session_error(&mut reader, e).await?,
                    }
                }
            }
            Command::Data => {
                if session.on_data_start().is_err() {
                    reader.get_mut().write_all(b"503 5.5.1 bad sequence of commands\r\n").await?;
                    continue;
                }
                reader
                    .get_mut()
                    .write_all(b"354 start mail input; end with <CRLF>.<CRLF>\r\n")
                    .await?;
                let body = read_dot_stuffed_body(&mut reader, max_message_size).await?;
                let user_id = session.authenticated_user_id;
                let (sender, recipients) = session.on_data_complete();
                session.state = State::Ready;
                match body {
                    Some(body) => {
                        let deadline = Deadline::after(std::time::Duration::from_secs(60));
                        let outcome = if profile.requires_local_recipient() {
                            ingress
                                .commit_inbound(deadline, peer_addr.ip(), &sender, &recipients, &body)
                                .await
                                .map(|_| ())
                        } else {
                            commit_submission_and_enqueue(
                                &ingress,
                                deadline,
                                user_id,
                                &sender,
                                recipients,
                                body,
                                spool_dir,
                                queue.as_deref(),
                            )
                            .await
                        };
                        match outcome {
                            Ok(()) => reader.get_mut().write_all(b"250 2.0.0 message accepted\r\n").await?,
                            Err(_) => reader.get_mut().write_all(b"451 4.3.0 temporary failure\r\n").await?,
                        }
                    }
                    None => reader.get_mut().write_all(b"552 5.3.4 message too large\r\n").await?,
                }
            }
            Command::Rset => {
                session.on_rset();
                reader.get_mut().write_all(b"250 2.0.0 ok\r\n").await?;
            }
            Command::Noop => reader.get_mut().write_all(b"250 2.0.0 ok\r\n").await?,
            Command::Vrfy | Command::Help => {
                reader.get_mut().write_all(b"502 5.5.1 command not implemented\r\n").await?;
            }
            Command::AuthContinuation(_) => {
                reader.get_mut().write_all(b"501 5.5.2 unexpected\r\n").await?;
            }
        }
    }
}

/// Submission commit path: appends to Sent, signs, spools to disk, and
/// (when a queue handle is configured) enqueues for outbound delivery
/// (§4.4). Requires the session to already be authenticated; an
/// unauthenticated caller never reaches `DATA` on the submission profile
/// because [`Session::on_mail_from`] rejects it first.
async fn commit_submission_and_enqueue(
    ingress: &Ingress,
    deadline: Deadline,
    user_id: Option<i64>,
    sender: &str,
    recipients: Vec<String>,
    body: Vec<u8>,
    spool_dir: &std::path::Path,
    queue: Option<&RedisQueue>,
) -> Result<(), crate::ingress::IngressError> {
    let user_id = user_id.ok_or_else(|| crate::ingress::IngressError::Transient("not authenticated".into()))?;
    let sender_domain = sender.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
    let (_uid, queue_message) = ingress
        .commit_submission(deadline, user_id, sender_domain, sender, recipients, body, spool_dir)
        .await?;
    if let Some(queue) = queue {
        queue
            .enqueue(&queue_message)
            .await
            .map_err(|e| crate::ingress::IngressError::Transient(e.to_string()))?;
    }
    Ok(())
}

/// Decodes an RFC 4616 `PLAIN` payload: `authzid NUL authcid NUL password`.
fn decode_plain(payload: &str) -> Option<(String, String)> {
    let raw = STANDARD.decode(payload.trim()).ok()?;
    let mut parts = raw.split(|b| *b == 0);
    let _authzid = parts.next()?;
    let authcid = parts.next()?;
    let password = parts.next()?;
    Some((
        String::from_utf8(authcid.to_vec()).ok()?,
        String::from_utf8(password.to_vec()).ok()?,
    ))
}

async fn complete_plain_auth<S: tokio::io::AsyncWrite + Unpin>(
    reader: &mut BufReader<S>,
    session: &mut Session,
    core: &Core,
    auth_limiter: &AuthRateLimiter,
    peer_addr: SocketAddr,
    payload: &str,
) -> std::io::Result<()> {
    let Some((username, password)) = decode_plain(payload) else {
        reader.get_mut().write_all(b"501 5.5.2 malformed auth response\r\n").await?;
        return Ok(());
    };
    verify_and_finish(reader, session, core, auth_limiter, peer_addr, &username, &password).await
}

async fn verify_and_finish<S: tokio::io::AsyncWrite + Unpin>(
    reader: &mut BufReader<S>,
    session: &mut Session,
    core: &Core,
    auth_limiter: &AuthRateLimiter,
    peer_addr: SocketAddr,
    username: &str,
    password: &str,
) -> std::io::Result<()> {
    let deadline = Deadline::after(std::time::Duration::from_secs(10));
    let creds = Credentials::Plain { username: username.to_string(), password: password.to_string() };
    match core.directory.query(deadline, QueryParams::credentials(&creds)).await {
        Ok(user) => {
            auth_limiter.record_success(peer_addr.ip());
            match session.on_auth_success(user.id) {
                Ok(()) => reader.get_mut().write_all(b"235 2.7.0 authentication successful\r\n").await?,
                Err(_) => reader.get_mut().write_all(b"503 5.5.1 bad sequence of commands\r\n").await?,
            }
        }
        Err(DirectoryError::InvalidCredentials) | Err(DirectoryError::NotFound) => {
            auth_limiter.record_failure(peer_addr.ip());
            reader.get_mut().write_all(b"535 5.7.8 authentication failed\r\n").await?;
        }
        Err(_) => {
            reader.get_mut().write_all(b"451 4.3.0 temporary authentication failure\r\n").await?;
        }
    }
    Ok(())
}

async fn handle_auth_continuation<S: tokio::io::AsyncWrite + Unpin>(
    reader: &mut BufReader<S>,
    session: &mut Session,
    stage: &mut AuthStage,
    continuation: Command,
    core: &Core,
    auth_limiter: &AuthRateLimiter,
    peer_addr: SocketAddr,
) -> std::io::Result<()> {
    let Command::AuthContinuation(payload) = continuation else {
        unreachable!("parse_auth_continuation always returns AuthContinuation");
    };
    if payload.trim() == "*" {
        *stage = AuthStage::None;
        reader.get_mut().write_all(b"501 5.0.0 authentication cancelled\r\n").await?;
        return Ok(());
    }
    match std::mem::replace(stage, AuthStage::None) {
        AuthStage::AwaitingPlainResponse => {
            complete_plain_auth(reader, session, core, auth_limiter, peer_addr, &payload).await?;
        }
        AuthStage::AwaitingLoginUsername => {
            let Ok(decoded) = STANDARD.decode(payload.trim()) else {
                reader.get_mut().write_all(b"501 5.5.2 malformed auth response\r\n").await?;
                return Ok(());
            };
            let username = String::from_utf8_lossy(&decoded).into_owned();
            let prompt = format!("334 {}\r\n", STANDARD.encode("Password:"));
            reader.get_mut().write_all(prompt.as_bytes()).await?;
            *stage = AuthStage::AwaitingLoginPassword { username };
        }
        AuthStage::AwaitingLoginPassword { username } => {
            let Ok(decoded) = STANDARD.decode(payload.trim()) else {
                reader.get_mut().write_all(b"501 5.5.2 malformed auth response\r\n").await?;
                return Ok(());
            };
            let password = String::from_utf8_lossy(&decoded).into_owned();
            verify_and_finish(reader, session, core, auth_limiter, peer_addr, &username, &password).await?;
        }
        AuthStage::None => unreachable!("caller only dispatches here when a stage is pending"),
    }
    Ok(())
}

async fn write_ehlo_reply<S: tokio::io::AsyncWrite + Unpin>(
    reader: &mut BufReader<S>,
    session: &Session,
    max_message_size: usize,
    require_tls: bool,
    tls_available: bool,
) -> std::io::Result<()> {
    let _ = require_tls;
    let mut out = String::from("250-mail.example.com\r\n");
    out.push_str(&format!("250-SIZE {max_message_size}\r\n"));
    out.push_str("250-8BITMIME\r\n");
    out.push_str("250-PIPELINING\r\n");
    if !session.tls_active && tls_available {
        out.push_str("250-STARTTLS\r\n");
    }
    if session.profile.advertises_auth() {
        out.push_str("250 AUTH PLAIN LOGIN\r\n");
    } else {
        out.push_str("250 OK\r\n");
    }
    reader.get_mut().write_all(out.as_bytes()).await
}

async fn write_session_error<S: tokio::io::AsyncWrite + Unpin>(
    reader: &mut BufReader<S>,
    error: SessionError,
) -> std::io::Result<()> {
    let line: &[u8] = match error {
        SessionError::Syntax => b"500 5.5.2 syntax error\r\n",
        SessionError::Sequence => b"503 5.5.1 bad sequence of commands\r\n",
        SessionError::AuthFailed => b"530 5.7.0 authentication required\r\n",
        SessionError::EncryptionRequired => b"538 5.7.11 encryption required\r\n",
        SessionError::PolicyDenied => b"550 5.7.1 policy denied\r\n",
        SessionError::QuotaExceeded => b"552 5.2.2 quota exceeded\r\n",
        SessionError::Transient => b"451 4.3.0 temporary failure\r\n",
        SessionError::TooManyErrors => b"421 4.7.0 too many errors\r\n",
    };
    reader.get_mut().write_all(line).await
}

/// Reads DATA input until the lone-`.` terminator, undoing dot-stuffing.
/// Returns `None` if `max_message_size` is exceeded (caller sends `552`).
async fn read_dot_stuffed_body<S: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<S>,
    max_message_size: usize,
) -> std::io::Result<Option<Vec<u8>>> {
    let mut body = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        if line == ".\r\n" || line == ".\n" {
            break;
        }
        let unstuffed = if let Some(rest) = line.strip_prefix('.') { rest } else { line.as_str() };
        if body.len() + unstuffed.len() > max_message_size {
            // Drain until terminator so the connection stays usable.
            while reader.read_line(&mut line).await? > 0 && line != ".\r\n" && line != ".\n" {
                line.clear();
            }
            return Ok(None);
        }
        body.extend_from_slice(unstuffed.as_bytes());
    }
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_payload() {
        // "\0alice\0hunter2" base64-encoded.
        let payload = STANDARD.encode(b"\0alice\0hunter2");
        let (user, pass) = decode_plain(&payload).unwrap();
        assert_eq!(user, "alice");
        assert_eq!(pass, "hunter2");
    }

    #[test]
    fn rejects_malformed_plain_payload() {
        let payload = STANDARD.encode(b"nouls-here");
        assert!(decode_plain(&payload).is_none());
    }
}
