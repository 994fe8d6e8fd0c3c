/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! TLS plumbing shared by the SMTP and IMAP listeners: building a
//! `rustls::ServerConfig` from a PEM cert/key pair, and a stream type that
//! starts plaintext and can be upgraded to TLS in place, either at accept
//! time (465/993 implicit TLS) or mid-session (`STARTTLS`).

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::rustls;
use tokio_rustls::server::TlsStream;
pub use tokio_rustls::TlsAcceptor;

/// Parses a PEM certificate chain and private key and builds a
/// `TlsAcceptor`. Key material provisioning (ACME, file watching) is an
/// external collaborator; this only turns bytes already in hand into a
/// working acceptor.
pub fn build_acceptor(cert_pem: &[u8], key_pem: &[u8]) -> io::Result<TlsAcceptor> {
    let cert_chain = rustls_pemfile::certs(&mut &*cert_pem).collect::<Result<Vec<_>, _>>()?;
    let key = rustls_pemfile::private_key(&mut &*key_pem)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key in PEM input"))?;
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// A connection that may be plaintext or TLS. Listeners on an implicit-TLS
/// port hand out `Tls` immediately; opportunistic listeners hand out `Plain`
/// and upgrade via [`MaybeTlsStream::into_plain`] + a fresh `accept` call
/// when `STARTTLS` succeeds.
pub enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl MaybeTlsStream {
    pub fn is_tls(&self) -> bool {
        matches!(self, MaybeTlsStream::Tls(_))
    }

    /// Returns the underlying `TcpStream` if this connection hasn't already
    /// been upgraded. `STARTTLS` issued twice is rejected by the session
    /// state machine before this is ever called with a `Tls` value.
    pub fn into_plain(self) -> Option<TcpStream> {
        match self {
            MaybeTlsStream::Plain(stream) => Some(stream),
            MaybeTlsStream::Tls(_) => None,
        }
    }
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_flush(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
