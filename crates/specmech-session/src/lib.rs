//! specmech-session: the send/receive/classify cycle for the specMech
//! gateway.
//!
//! This crate ties the [`Transport`](specmech_core::Transport) abstraction
//! to the protocol layer in `specmech-proto` to produce a working device
//! session. It handles command framing (`<text>;<id>\r`), the
//! accumulate-until-terminator read loop, reboot detection, and reply
//! correlation against the outstanding-command queue.
//!
//! - [`DeviceSession`] -- owns one live connection and drives one command
//!   cycle at a time
//! - [`SessionBuilder`] -- fluent configuration and construction
//! - [`SessionSupervisor`] -- reconnect policy on top of a session, for the
//!   command-dispatch layer

pub mod session;
pub mod supervisor;

pub use session::{DeviceSession, SessionBuilder, REBOOT_ACK};
pub use supervisor::SessionSupervisor;
