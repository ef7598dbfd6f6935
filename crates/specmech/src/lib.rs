//! # specmech -- Gateway for the BOSS Spectrograph Mechanism Controller
//!
//! `specmech` is an asynchronous Rust library for talking to the specMech
//! microcontroller that drives the BOSS spectrograph mechanisms: collimator
//! motors, shutter and Hartmann doors, ion pumps, and the environment
//! sensors around them. The controller exposes a line-oriented terminal
//! interface; this library frames commands, correlates replies, detects
//! controller reboots, and decodes the checksummed telemetry sentences in
//! every status reply.
//!
//! ## Quick Start
//!
//! ```no_run
//! use specmech::{SessionBuilder, StatusReport};
//!
//! # async fn example() -> specmech::Result<()> {
//! let session = SessionBuilder::new("10.25.1.140:23").build().await?;
//!
//! let raw = session.send("rs").await?;
//! let report = StatusReport::parse_reply(&raw);
//! if let Some(position) = report.motor_positions.motor_a {
//!     println!("motor A: {position} steps");
//! }
//!
//! session.close().await
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                   | Purpose                                      |
//! |-------------------------|----------------------------------------------|
//! | `specmech-core`         | [`Transport`] trait, [`CommandQueue`], errors |
//! | `specmech-transport`    | TCP (telnet-style) and serial transports      |
//! | `specmech-proto`        | Sentence parsing and status decoding          |
//! | `specmech-session`      | [`DeviceSession`], [`SessionSupervisor`]      |
//! | `specmech-test-harness` | Mock transport and mock controller for tests  |
//! | **`specmech`**          | This facade crate -- re-exports everything    |
//!
//! ## The command cycle
//!
//! Every command gets a session-lifetime sequence id and goes out as
//! `<text>;<id>\r`. The controller answers with telemetry sentences ending
//! in a `>` prompt, echoing the id in the first sentence's trailer, which
//! retires the matching entry from the pending queue. A bare `!` instead
//! of a reply means the controller rebooted and is holding all motion
//! until the acknowledgment ([`REBOOT_ACK`]) is sent.
//!
//! The controller processes one command at a time, so [`DeviceSession`]
//! serializes cycles; use [`DeviceSession::try_send`] to fail fast with
//! [`Error::SessionBusy`] instead of queueing behind an in-flight cycle.

pub use specmech_core::{Command, CommandQueue, Error, Result, Transport};
pub use specmech_proto::{
    correlation_id, parse, DoorState, Environment, MotorPositions, Orientation, Pneumatics,
    Sentence, StatusReport, SwitchState, SystemInfo, Vacuum, LINE_BREAK, SENTINEL,
};
pub use specmech_session::{DeviceSession, SessionBuilder, SessionSupervisor, REBOOT_ACK};
pub use specmech_transport::{SerialConfig, SerialTransport, TcpTransport};

/// Protocol-level building blocks, for callers that need more than the
/// top-level re-exports.
pub mod proto {
    pub use specmech_proto::*;
}
