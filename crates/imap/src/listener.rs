/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! TCP accept loop and per-connection I/O driver (§4.3, §5). Parses tagged
//! command lines off the wire, drives [`op::dispatch`], and handles the two
//! commands that need wire-level help beyond a single request/response:
//! `APPEND` (reads the literal body) and `IDLE` (subscribes to
//! [`IdleRegistry`] until `DONE` or the server timer fires).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::tls::{MaybeTlsStream, TlsAcceptor};
use common::Core;
use policy::AuthRateLimiter;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use trc::{Collector, EventType, ImapEvent};
use utils::limiter::ConcurrencyLimiter;
use utils::Deadline;

use crate::command::{self, Command, ParsedLine};
use crate::idle::{IdleRegistry, Update, UpdateKind};
use crate::op;
use crate::response::{flags_to_atoms, Response, UntaggedLine};
use crate::session::Session;

pub struct ListenerConfig {
    pub addr: SocketAddr,
    pub max_connections: usize,
    pub idle_timeout: Duration,
    pub auth_limiter: Arc<AuthRateLimiter>,
    /// `STARTTLS` upgrades the plaintext connection in place using this
    /// acceptor. `None` disables `STARTTLS` (the command is rejected).
    pub tls_acceptor: Option<Arc<TlsAcceptor>>,
    /// When `true`, every accepted connection is wrapped in TLS before the
    /// session state machine sees a byte (implicit TLS, port 993). Requires
    /// `tls_acceptor` to be set.
    pub implicit_tls: bool,
}

fn op_deadline() -> Deadline {
    Deadline::after(Duration::from_secs(30))
}

pub async fn run(
    config: ListenerConfig,
    core: Arc<Core>,
    idle: Arc<IdleRegistry>,
    collector: Arc<dyn Collector>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.addr).await?;
    let limiter = Arc::new(ConcurrencyLimiter::new(config.max_connections));
    let idle_timeout = config.idle_timeout;
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
                let idle = idle.clone();
                let collector = collector.clone();
                let auth_limiter = auth_limiter.clone();
                let tls_acceptor = tls_acceptor.clone();
                tokio::spawn(async move {
                    let _guard = guard;

                    let stream = if implicit_tls {
                        let Some(acceptor) = tls_acceptor.as_deref() else {
                            collector.record(ImapEvent::Error.into_err().reason("implicit TLS listener has no acceptor configured"));
                            return;
                        };
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => MaybeTlsStream::Tls(Box::new(tls_stream)),
                            Err(e) => {
                                collector.record(ImapEvent::Error.into_err().reason(e.to_string()));
                                return;
                            }
                        }
                    } else {
                        MaybeTlsStream::Plain(stream)
                    };

                    collector.record(ImapEvent::ConnectionStart.into_err());
                    if let Err(e) = handle_connection(stream, peer_addr, core, idle, collector.clone(), auth_limiter, idle_timeout, tls_acceptor).await {
                        collector.record(ImapEvent::Error.into_err().reason(e.to_string()));
                    }
                    collector.record(ImapEvent::ConnectionEnd.into_err());
                });
            }
        }
    }
}

async fn handle_connection(
    stream: MaybeTlsStream,
    peer_addr: SocketAddr,
    core: Arc<Core>,
    idle: Arc<IdleRegistry>,
    collector: Arc<dyn Collector>,
    auth_limiter: Arc<AuthRateLimiter>,
    idle_timeout: Duration,
    tls_acceptor: Option<Arc<TlsAcceptor>>,
) -> std::io::Result<()> {
    let mut session = Session::new();
    let mut reader = BufReader::new(stream);

    reader.get_mut().write_all(b"* OK IMAP4rev1 Service Ready\r\n").await?;

    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(());
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            continue;
        }
        let Some((tag, rest)) = trimmed.split_once(' ') else {
            reader.get_mut().write_all(b"* BAD missing tag\r\n").await?;
            continue;
        };

        match command::parse_command(rest) {
            Ok(ParsedLine::Command(Command::Idle)) => {
                if session.require_selected().is_err() {
                    write_response(&mut reader, tag, &Response::bad("command not permitted in this state")).await?;
                    continue;
                }
                run_idle(&mut reader, &mut session, &idle, &collector, tag, idle_timeout).await?;
            }
            Ok(ParsedLine::Command(cmd)) => {
                let is_starttls = matches!(cmd, Command::StartTls);
                let resp = op::dispatch(
                    &core,
                    &idle,
                    &mut session,
                    collector.as_ref(),
                    &auth_limiter,
                    peer_addr.ip(),
                    cmd,
                    op_deadline(),
                )
                .await;
                let close = resp.close_connection;
                let upgrade = resp.upgrade_tls;
                write_response(&mut reader, tag, &resp).await?;
                if close {
                    return Ok(());
                }
                if is_starttls && upgrade {
                    let Some(acceptor) = tls_acceptor.as_ref() else {
                        continue;
                    };
                    let plain = reader.into_inner().into_plain().expect("session was not yet TLS");
                    let tls_stream = acceptor.accept(plain).await?;
                    reader = BufReader::new(MaybeTlsStream::Tls(Box::new(tls_stream)));
                }
            }
            Ok(ParsedLine::AppendPending { mailbox, flags, literal_len }) => {
                reader.get_mut().write_all(b"+ OK\r\n").await?;
                let body = read_literal(&mut reader, literal_len).await?;
                let resp = op::append::execute(&core, &idle, &session, &mailbox, &flags, body, op_deadline()).await;
                write_response(&mut reader, tag, &resp).await?;
            }
            Err(e) => {
                let msg = format!("{tag} BAD {}\r\n", e.message);
                reader.get_mut().write_all(msg.as_bytes()).await?;
            }
        }
    }
}

/// Reads the `{n}` literal body, then drains the remainder of the line
/// (the CRLF that always follows a literal's raw bytes; `APPEND` never
/// places more tokens after it).
async fn read_literal<S: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<S>,
    len: usize,
) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    let mut rest = String::new();
    reader.read_line(&mut rest).await?;
    Ok(buf)
}

async fn write_response<S: tokio::io::AsyncWrite + Unpin>(
    reader: &mut BufReader<S>,
    tag: &str,
    resp: &Response,
) -> std::io::Result<()> {
    for line in &resp.untagged {
        match line {
            UntaggedLine::Text(s) => {
                reader.get_mut().write_all(format!("* {s}\r\n").as_bytes()).await?;
            }
            UntaggedLine::Literal { prefix, bytes, suffix } => {
                reader.get_mut().write_all(format!("* {prefix}{{{}}}\r\n", bytes.len()).as_bytes()).await?;
                reader.get_mut().write_all(bytes).await?;
                reader.get_mut().write_all(format!("{suffix}\r\n").as_bytes()).await?;
            }
        }
    }
    reader
        .get_mut()
        .write_all(format!("{tag} {} {}\r\n", resp.status.as_str(), resp.text).as_bytes())
        .await?;
    Ok(())
}

/// Drives the `IDLE` loop: forwards [`Update`]s for the selected mailbox as
/// untagged responses until the client sends a bare `DONE` line or
/// `idle_timeout` elapses (§4.3 IDLE).
async fn run_idle<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin>(
    reader: &mut BufReader<S>,
    session: &mut Session,
    idle: &IdleRegistry,
    collector: &Arc<dyn Collector>,
    tag: &str,
    idle_timeout: Duration,
) -> std::io::Result<()> {
    let Some(mailbox_id) = session.selected_mailbox.as_ref().map(|m| m.id) else {
        write_response(reader, tag, &Response::bad("command not permitted in this state")).await?;
        return Ok(());
    };
    session.idling = true;
    reader.get_mut().write_all(b"+ idling\r\n").await?;
    let mut rx = idle.subscribe(mailbox_id);
    let mut done_line = String::new();

    loop {
        tokio::select! {
            result = reader.read_line(&mut done_line) => {
                let n = result?;
                if n == 0 {
                    return Ok(());
                }
                if done_line.trim() == "DONE" {
                    break;
                }
                done_line.clear();
            }
            update = rx.recv() => {
                if let Ok(update) = update {
                    if let Some(text) = render_idle_update(session, &update) {
                        reader.get_mut().write_all(format!("* {text}\r\n").as_bytes()).await?;
                    }
                }
            }
            _ = tokio::time::sleep(idle_timeout) => {
                break;
            }
        }
    }

    session.idling = false;
    collector.record(ImapEvent::IdleEnd.into_err());
    write_response(reader, tag, &Response::ok("IDLE completed")).await?;
    Ok(())
}

fn render_idle_update(session: &mut Session, update: &Update) -> Option<String> {
    let selected_id = session.selected_mailbox.as_ref()?.id;
    if selected_id != update.mailbox_id {
        return None;
    }
    match update.kind {
        UpdateKind::Exists { message_count } => Some(format!("{message_count} EXISTS")),
        UpdateKind::FlagsChanged { uid, flags } => {
            let seq = session.snapshot.uid_to_seq(uid)?;
            Some(format!("{seq} FETCH (FLAGS ({}))", flags_to_atoms(store::Flags(flags)).join(" ")))
        }
        UpdateKind::Expunge { uid } => {
            let seq = session.snapshot.apply_expunge(&[uid]).into_iter().next()?;
            Some(format!("{seq} EXPUNGE"))
        }
    }
}

