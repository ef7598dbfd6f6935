//! Transport implementations for the specMech gateway.
//!
//! Two concrete [`Transport`](specmech_core::Transport) implementations:
//! [`TcpTransport`] for the controller's telnet-style network interface
//! (port 23 on the instrument LAN, or the emulator during development),
//! and [`SerialTransport`] for its console port on the bench.
//!
//! Both move raw bytes; command framing and reply termination live in the
//! session layer. Used directly they look like this:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use specmech_core::Transport;
//! use specmech_transport::TcpTransport;
//!
//! # async fn example() -> specmech_core::Result<()> {
//! let mut link = TcpTransport::connect("10.25.1.140:23").await?;
//!
//! // Ask for the firmware version (command id 1), read until the prompt.
//! link.send(b"rv;1\r").await?;
//! let mut reply = Vec::new();
//! let mut chunk = [0u8; 1024];
//! while !reply.contains(&b'>') {
//!     let n = link.receive(&mut chunk, Duration::from_secs(2)).await?;
//!     reply.extend_from_slice(&chunk[..n]);
//! }
//! # Ok(())
//! # }
//! ```

pub mod serial;
pub mod tcp;

pub use serial::{SerialConfig, SerialTransport};
pub use tcp::TcpTransport;
