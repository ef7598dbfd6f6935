//! Error types for the specMech gateway.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! session-layer errors are all captured here.

/// The error type for all specMech gateway operations.
///
/// Variants cover the failure modes encountered when talking to the
/// controller: unreachable endpoints, dropped connections, malformed
/// telemetry, and contention for the single command slot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The controller endpoint could not be reached.
    ///
    /// Surfaced to the caller as-is; the session never retries a failed
    /// connect on its own. Reconnection is the supervisor's job.
    #[error("connection error: {0}")]
    Connection(String),

    /// The connection to the controller was lost mid-cycle.
    #[error("connection lost")]
    ConnectionLost,

    /// No connection has been established, or the session was closed.
    #[error("not connected")]
    NotConnected,

    /// A command cycle is already in flight on this session.
    ///
    /// The controller processes one command at a time over its terminal
    /// interface, so a second send must wait for the current reply.
    #[error("session busy: a command cycle is already in flight")]
    SessionBusy,

    /// A telemetry sentence or reply trailer could not be parsed.
    ///
    /// On the correlation path this is absorbed and logged; it only
    /// propagates from the pure parser API.
    #[error("parse error: {0}")]
    Parse(String),

    /// Timed out connecting, or waiting for a reply when the session is
    /// configured with a bounded reply wait.
    #[error("timeout waiting for specMech")]
    Timeout,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let cases: &[(Error, &str)] = &[
            (
                Error::Connection("connection refused: 10.25.1.140:23".into()),
                "connection error: connection refused: 10.25.1.140:23",
            ),
            (Error::ConnectionLost, "connection lost"),
            (Error::NotConnected, "not connected"),
            (
                Error::Parse("missing $S2 sentinel".into()),
                "parse error: missing $S2 sentinel",
            ),
            (Error::Timeout, "timeout waiting for specMech"),
        ];
        for (error, expected) in cases {
            assert_eq!(&error.to_string(), expected);
        }

        assert!(Error::SessionBusy.to_string().contains("already in flight"));
    }

    #[test]
    fn io_errors_convert_and_keep_their_message() {
        let broken = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let error: Error = broken.into();
        assert!(matches!(error, Error::Io(_)));
        assert!(error.to_string().contains("pipe broken"));
    }

    #[test]
    fn usable_across_tasks_and_as_dyn_error() {
        // The session hands errors across spawned tasks, so the enum has
        // to be Send + Sync and a std error.
        fn check<T: Send + Sync + std::error::Error>() {}
        check::<Error>();
    }
}
