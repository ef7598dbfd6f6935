//! The session supervisor: reconnect policy for the dispatch layer.
//!
//! Command handlers talk to a [`SessionSupervisor`] rather than to a
//! [`DeviceSession`] directly. The supervisor owns the session by value (no
//! ambient global), carries the builder it was connected with, and reopens
//! the transport when the connection drops mid-cycle.
//!
//! Sequence ids are per-connection: a reconnect builds a fresh session, so
//! the counter restarts at 1 and any commands orphaned by the old
//! connection are gone from the pending snapshot.

use tokio::sync::Mutex;
use tracing::{info, warn};

use specmech_core::{Command, Error, Result};

use crate::session::{DeviceSession, SessionBuilder};

/// How many times a lost connection is reopened per `send` by default.
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 1;

/// Owns a [`DeviceSession`] and reopens it on connection loss.
///
/// Everything else passes straight through: `SessionBusy`, parse-degraded
/// replies, and reboot state are the session's business, and connect
/// failures during a reopen surface to the caller unretried.
pub struct SessionSupervisor {
    builder: SessionBuilder,
    session: Mutex<DeviceSession>,
    reconnect_attempts: u32,
}

impl SessionSupervisor {
    /// Connect a supervised session with the default reconnect policy.
    pub async fn connect(builder: SessionBuilder) -> Result<Self> {
        Self::connect_with_attempts(builder, DEFAULT_RECONNECT_ATTEMPTS).await
    }

    /// Connect a supervised session, reopening a lost connection up to
    /// `reconnect_attempts` times per send.
    pub async fn connect_with_attempts(
        builder: SessionBuilder,
        reconnect_attempts: u32,
    ) -> Result<Self> {
        let session = builder.clone().build().await?;
        info!(addr = %builder.addr(), "supervised session connected");
        Ok(Self {
            builder,
            session: Mutex::new(session),
            reconnect_attempts,
        })
    }

    /// Wrap an already-built session, keeping `builder` for reconnects.
    pub fn with_session(builder: SessionBuilder, session: DeviceSession) -> Self {
        Self {
            builder,
            session: Mutex::new(session),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
        }
    }

    /// Send a command, reopening the connection if it drops mid-cycle.
    ///
    /// A retried command is re-sent on the fresh session and gets a new
    /// sequence id starting from 1.
    pub async fn send(&self, text: &str) -> Result<String> {
        let mut session = self.session.lock().await;
        let mut attempt = 0u32;
        loop {
            match session.send(text).await {
                Err(Error::ConnectionLost) if attempt < self.reconnect_attempts => {
                    attempt += 1;
                    warn!(
                        addr = %self.builder.addr(),
                        attempt,
                        "connection to specMech lost, reopening"
                    );
                    *session = self.builder.clone().build().await?;
                }
                result => return result,
            }
        }
    }

    /// Whether the controller is waiting for a reboot acknowledgment.
    pub async fn reboot_pending(&self) -> bool {
        self.session.lock().await.reboot_pending().await
    }

    /// The raw text of the last completed reply.
    pub async fn last_raw_reply(&self) -> String {
        self.session.lock().await.last_raw_reply().await
    }

    /// Snapshot of the commands still awaiting a correlated reply.
    pub async fn pending_commands(&self) -> Vec<Command> {
        self.session.lock().await.pending_commands().await
    }

    /// Close the underlying session. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.session.lock().await.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specmech_test_harness::{mock_server::canned_status, MockMechServer};

    #[tokio::test]
    async fn send_end_to_end_over_tcp() {
        let mut server = MockMechServer::bind().await.unwrap();
        server.expect("rs;1", &canned_status("1"));
        server.start();

        let supervisor = SessionSupervisor::connect(SessionBuilder::new(server.addr()))
            .await
            .unwrap();

        let raw = supervisor.send("rs").await.unwrap();
        assert!(raw.contains("$S2MRA,1200,1*"));
        assert!(raw.ends_with('>'));
        assert!(supervisor.pending_commands().await.is_empty());
        assert!(!supervisor.reboot_pending().await);

        supervisor.close().await.unwrap();
        server.wait().await.unwrap();
    }

    #[tokio::test]
    async fn reconnects_after_a_dropped_connection() {
        let mut server = MockMechServer::bind().await.unwrap();
        server.expect_drop("st;1");
        // The fresh session restarts its counter, so the retry is id 1 again.
        server.expect("st;1", "$S2MRA,873,1*00\r\x00\n>");
        server.start();

        let supervisor = SessionSupervisor::connect(SessionBuilder::new(server.addr()))
            .await
            .unwrap();

        let raw = supervisor.send("st").await.unwrap();
        assert!(raw.contains("873"));
        assert!(supervisor.pending_commands().await.is_empty());

        server.wait().await.unwrap();
    }

    #[tokio::test]
    async fn gives_up_when_the_endpoint_stays_down() {
        let mut server = MockMechServer::bind().await.unwrap();
        server.expect_drop("st;1");
        server.start();

        let supervisor = SessionSupervisor::connect(SessionBuilder::new(server.addr()))
            .await
            .unwrap();

        // The script ends after the drop, taking the listener with it, so
        // the reopen cannot succeed.
        let result = supervisor.send("st").await;
        assert!(result.is_err());

        server.wait().await.unwrap();
    }

    #[tokio::test]
    async fn connect_failure_surfaces_to_the_caller() {
        // Bind and drop so the port is known-dead.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = SessionSupervisor::connect(SessionBuilder::new(&addr)).await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn with_session_wraps_an_existing_session() {
        let mut server = MockMechServer::bind().await.unwrap();
        server.expect("st;1", &canned_status("1"));
        server.start();

        let builder = SessionBuilder::new(server.addr());
        let session = builder.clone().build().await.unwrap();
        let supervisor = SessionSupervisor::with_session(builder, session);

        let raw = supervisor.send("st").await.unwrap();
        assert!(raw.ends_with('>'));

        supervisor.close().await.unwrap();
        server.wait().await.unwrap();
    }
}
