//! specmech-core: Core traits, types, and error definitions for the specMech
//! gateway.
//!
//! This crate defines the transport-agnostic abstractions the rest of the
//! workspace builds on. The session driver and the command-dispatch layer
//! depend on these types without pulling in any concrete transport.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel to the controller
//! - [`Command`] / [`CommandQueue`] -- in-flight command correlation state
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod queue;
pub mod transport;

pub use error::{Error, Result};
pub use queue::{Command, CommandQueue};
pub use transport::Transport;
