//! specmech-proto: telemetry sentence parsing and status decoding for the
//! specMech gateway.
//!
//! The controller reports state as NMEA-style sentences, one per line:
//!
//! ```text
//! $S2ENV,21.3,43.0,20.9,44.1,21.5,41.8,4*5C
//! ```
//!
//! Everything in this crate is a pure function over those lines. There is no
//! I/O and no shared state, so the same code runs on live replies inside the
//! session driver and on canned strings in tests.
//!
//! - [`sentence`] -- sentinel/checksum framing and the reply trailer
//! - [`status`] -- per-tag field layouts folded into a [`StatusReport`]

pub mod sentence;
pub mod status;

pub use sentence::{correlation_id, parse, Sentence, LINE_BREAK, SENTINEL};
pub use status::{
    DoorState, Environment, MotorPositions, Orientation, Pneumatics, StatusReport, SwitchState,
    SystemInfo, Vacuum,
};
