//! specmech-test-harness: mock transports and a scripted mock controller
//! for specMech gateway tests.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the session driver without real hardware, and [`MockMechServer`] for
//! end-to-end tests that exercise a real `TcpTransport` against a TCP
//! listener speaking the specMech wire format.

pub mod mock_server;
pub mod mock_transport;

pub use mock_server::MockMechServer;
pub use mock_transport::MockTransport;
