//! TCP transport for specMech communication.
//!
//! The controller's primary interface is a telnet-style TCP listener; the
//! observatory runs it on port 23 of the instrument LAN, and the specMech
//! emulator exposes the same interface on localhost during development.
//! [`TcpTransport`] implements the [`Transport`] trait over that stream.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

use specmech_core::{Error, Result, Transport};

/// How long a `connect` waits before giving up (5 seconds).
///
/// Long enough for the observatory network, short enough that a powered-off
/// controller fails a `connect` promptly instead of hanging the caller.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP transport for the controller's telnet-style interface.
///
/// Connects eagerly; once [`close`](Transport::close) has been called the
/// stream is gone and further I/O reports `NotConnected`.
#[derive(Debug)]
pub struct TcpTransport {
    // None once close() has run.
    stream: Option<TcpStream>,
    addr: String,
}

impl TcpTransport {
    /// Connect to a `host:port` endpoint using the default timeout.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, CONNECT_TIMEOUT).await
    }

    /// Connect to a `host:port` endpoint, waiting at most `timeout`.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        debug!(addr = %addr, timeout_ms = timeout.as_millis(), "connecting to specMech");

        let connect = TcpStream::connect(addr);
        let stream = match tokio::time::timeout(timeout, connect).await {
            Err(_) => {
                warn!(addr = %addr, "connection attempt timed out");
                return Err(Error::Timeout);
            }
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                warn!(addr = %addr, "connection refused");
                return Err(Error::Connection(format!("connection refused: {addr}")));
            }
            Ok(Err(e)) => {
                warn!(addr = %addr, error = %e, "connection failed");
                return Err(Error::Io(e));
            }
            Ok(Ok(stream)) => stream,
        };

        // Commands are single short lines and the caller blocks on the
        // reply, so Nagle only adds latency here.
        if let Err(e) = stream.set_nodelay(true) {
            warn!(addr = %addr, error = %e, "could not set TCP_NODELAY, continuing");
        }

        info!(addr = %addr, "connected to specMech");

        Ok(Self {
            stream: Some(stream),
            addr: addr.to_string(),
        })
    }

    /// The endpoint this transport was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!(addr = %self.addr, bytes = data.len(), data = ?data, "sending");

        stream.write_all(data).await.map_err(stream_error)?;
        stream.flush().await.map_err(stream_error)?;
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let read = tokio::time::timeout(timeout, stream.read(buf));
        match read.await {
            // 0 bytes on TCP means the controller hung up.
            Ok(Ok(0)) => {
                warn!(addr = %self.addr, "specMech closed the connection");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                trace!(addr = %self.addr, bytes = n, data = ?&buf[..n], "received");
                Ok(n)
            }
            Ok(Err(e)) => {
                warn!(addr = %self.addr, error = %e, "receive failed");
                Err(stream_error(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        debug!(addr = %self.addr, "closing connection");
        if let Err(e) = stream.flush().await {
            warn!(addr = %self.addr, error = %e, "flush on close failed, continuing");
        }
        if let Err(e) = stream.shutdown().await {
            warn!(addr = %self.addr, error = %e, "shutdown on close failed, continuing");
        }
        info!(addr = %self.addr, "connection closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Map a mid-stream I/O failure onto the gateway error taxonomy: the
/// various peer-went-away kinds collapse to `ConnectionLost` so the
/// supervisor's reconnect path sees one variant.
fn stream_error(e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::ConnectionReset
        | ErrorKind::BrokenPipe
        | ErrorKind::NotConnected
        | ErrorKind::ConnectionAborted => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}
