//! Transport trait for specMech communication.
//!
//! The [`Transport`] trait abstracts over the physical link to the
//! controller. Implementations exist for its telnet-style TCP interface,
//! for a direct serial console, and for mock transports in tests.
//!
//! The session driver operates on a `Transport` rather than directly on a
//! socket, so the same send/receive/classify cycle runs unchanged against
//! real hardware and against `MockTransport` from the
//! `specmech-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to the specMech controller.
///
/// Implementations handle connection state and error mapping at the
/// physical layer. Framing concerns (the `\r` command terminator, the `>`
/// and `!` reply markers) belong to the session driver that consumes this
/// trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the controller.
    ///
    /// Implementations should not return until all bytes have been written
    /// to the underlying link.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the controller into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits up to `timeout` for
    /// data to arrive and returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing arrived within the deadline. A reply usually spans several
    /// `receive` calls; accumulating until a terminator is the caller's job.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// Idempotent. After `close()`, subsequent `send()` and `receive()`
    /// calls return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
