//! The device session: one connection, one command cycle at a time.
//!
//! A [`DeviceSession`] owns a [`Transport`] plus the per-connection state
//! (command queue, reboot flag, last raw reply) and drives the full
//! send/receive/classify cycle:
//!
//! 1. Frame the command as `<text>;<id>\r` and append it to the queue
//!    (the bare reboot acknowledgment `!` is sent uncorrelated).
//! 2. Accumulate inbound bytes until the reply prompt `>` or the reboot
//!    marker `!` appears anywhere in the buffer. Partial data is never
//!    surfaced to the caller.
//! 3. Classify the reply: a buffer that is exactly `!` means the controller
//!    rebooted; anything else is a normal reply whose first sentence trails
//!    the echoed command id, which retires the matching queue entry.
//!
//! # Cancellation
//!
//! Abandoning a `send` future does not abort the command on the controller
//! side; the device will still execute it and emit a reply. Callers that
//! time out externally should keep the session alive and let the next
//! cycle consume the late reply (which retires the orphaned queue entry)
//! rather than tearing the connection down mid-read, which would
//! desynchronize the terminator search.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use specmech_core::{Command, CommandQueue, Error, Result, Transport};
use specmech_proto::sentence;
use specmech_transport::TcpTransport;

/// The uncorrelated acknowledgment the controller expects after a reboot.
pub const REBOOT_ACK: &str = "!";

/// The command that tells the controller the session is going away.
const QUIT_COMMAND: &[u8] = b"q\r";

/// Normal end-of-reply prompt.
const REPLY_PROMPT: u8 = b'>';

/// The marker the controller emits after an unplanned restart.
const REBOOT_MARKER: u8 = b'!';

/// How long one transport read waits before the loop re-checks the overall
/// deadline. With no reply timeout configured the loop simply polls again.
const READ_POLL: Duration = Duration::from_secs(1);

/// Fluent configuration for a [`DeviceSession`].
///
/// The defaults match the production setup: a 5 second connect timeout and
/// no bound on the reply wait (the controller answers every command, and
/// some mechanism moves take a long time).
///
/// # Example
///
/// ```no_run
/// use specmech_session::SessionBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> specmech_core::Result<()> {
/// let session = SessionBuilder::new("10.25.1.140:23")
///     .connect_timeout(Duration::from_secs(2))
///     .reply_timeout(Duration::from_secs(30))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    addr: String,
    connect_timeout: Duration,
    reply_timeout: Option<Duration>,
}

impl SessionBuilder {
    /// Create a builder targeting a `host:port` endpoint.
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            connect_timeout: Duration::from_secs(5),
            reply_timeout: None,
        }
    }

    /// The endpoint this builder connects to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Set the TCP connect timeout (default: 5 seconds).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound the wait for a complete reply.
    ///
    /// By default the session waits indefinitely, matching the controller's
    /// contract of exactly one reply per command. With a bound set, a cycle
    /// that exceeds it fails with [`Error::Timeout`] and leaves the
    /// command's queue entry in place for a later reply to retire.
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    /// Connect over TCP and build the session.
    pub async fn build(self) -> Result<DeviceSession> {
        let transport = TcpTransport::connect_with_timeout(&self.addr, self.connect_timeout).await?;
        Ok(self.build_with_transport(Box::new(transport)))
    }

    /// Build the session around a caller-provided transport.
    ///
    /// This is the entry point for tests (pass a `MockTransport` from
    /// `specmech-test-harness`) and for serial connections (pass a
    /// `SerialTransport`).
    pub fn build_with_transport(self, transport: Box<dyn Transport>) -> DeviceSession {
        DeviceSession {
            inner: Mutex::new(Inner {
                transport,
                queue: CommandQueue::new(),
                reboot_pending: false,
                last_raw_reply: String::new(),
                closed: false,
            }),
            reply_timeout: self.reply_timeout,
        }
    }
}

/// State owned by the session and mutated only under its lock.
struct Inner {
    transport: Box<dyn Transport>,
    queue: CommandQueue,
    reboot_pending: bool,
    last_raw_reply: String,
    closed: bool,
}

/// A live session with the specMech controller.
///
/// The controller processes one command at a time over its terminal
/// interface, so the session serializes cycles behind a single lock:
/// [`send`](DeviceSession::send) waits its turn,
/// [`try_send`](DeviceSession::try_send) fails fast with
/// [`Error::SessionBusy`] instead. All state the cycle touches (queue,
/// reboot flag, last reply) lives under the same lock, so observers see
/// each cycle's effects atomically.
pub struct DeviceSession {
    inner: Mutex<Inner>,
    reply_timeout: Option<Duration>,
}

impl DeviceSession {
    /// Connect to a `host:port` endpoint with default settings.
    pub async fn open(addr: &str) -> Result<Self> {
        SessionBuilder::new(addr).build().await
    }

    /// Send a command and wait for the complete raw reply.
    ///
    /// Blocks while another cycle is in flight. The literal [`REBOOT_ACK`]
    /// is transmitted without a sequence id; every other command is
    /// enqueued, framed as `<text>;<id>\r`, and correlated against the
    /// reply trailer when the cycle completes.
    pub async fn send(&self, text: &str) -> Result<String> {
        let mut inner = self.inner.lock().await;
        inner.cycle(text, self.reply_timeout).await
    }

    /// As [`send`](DeviceSession::send), but fail immediately with
    /// [`Error::SessionBusy`] if a cycle is already in flight.
    pub async fn try_send(&self, text: &str) -> Result<String> {
        let mut inner = self.inner.try_lock().map_err(|_| Error::SessionBusy)?;
        inner.cycle(text, self.reply_timeout).await
    }

    /// Whether the controller reported a reboot on the last completed cycle
    /// and is waiting for the [`REBOOT_ACK`].
    pub async fn reboot_pending(&self) -> bool {
        self.inner.lock().await.reboot_pending
    }

    /// The raw text of the last completed reply.
    pub async fn last_raw_reply(&self) -> String {
        self.inner.lock().await.last_raw_reply.clone()
    }

    /// Snapshot of the commands still awaiting a correlated reply.
    pub async fn pending_commands(&self) -> Vec<Command> {
        self.inner.lock().await.queue.snapshot()
    }

    /// Send the quit command and release the transport.
    ///
    /// The quit is best effort: the controller drops the link on quit, so
    /// no reply is read and a transmit failure is not an error. Closing an
    /// already-closed session is a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;

        if inner.transport.is_connected() {
            if let Err(e) = inner.transport.send(QUIT_COMMAND).await {
                debug!(error = %e, "quit command failed on close");
            }
        }
        inner.transport.close().await
    }
}

impl Inner {
    /// One full command cycle: frame, transmit, read, classify.
    async fn cycle(&mut self, text: &str, reply_timeout: Option<Duration>) -> Result<String> {
        if self.closed {
            return Err(Error::NotConnected);
        }

        let wire = if text == REBOOT_ACK {
            // Reboot acknowledgments are not correlated.
            debug!("acknowledging controller reboot");
            format!("{REBOOT_ACK}\r")
        } else {
            let id = self.queue.enqueue(text);
            debug!(id, command = %text, "sending command");
            format!("{text};{id}\r")
        };

        self.transport.send(wire.as_bytes()).await?;

        let raw = self.read_reply(reply_timeout).await?;
        self.classify(&raw);
        self.last_raw_reply = raw.clone();
        Ok(raw)
    }

    /// Accumulate inbound bytes until a terminator appears.
    ///
    /// A reply may span any number of underlying reads; the caller never
    /// sees partial data. The only size cap is available memory.
    async fn read_reply(&mut self, reply_timeout: Option<Duration>) -> Result<String> {
        let deadline = reply_timeout.map(|t| tokio::time::Instant::now() + t);
        let mut raw: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];

        loop {
            let wait = match deadline {
                Some(deadline) => {
                    let left = deadline
                        .saturating_duration_since(tokio::time::Instant::now());
                    if left.is_zero() {
                        warn!(
                            buffered = raw.len(),
                            "gave up waiting for a reply terminator"
                        );
                        return Err(Error::Timeout);
                    }
                    left.min(READ_POLL)
                }
                None => READ_POLL,
            };

            // The outer timeout also covers transports that overrun the
            // deadline they were given.
            match tokio::time::timeout(wait, self.transport.receive(&mut buf, wait)).await {
                Ok(Ok(n)) => {
                    raw.extend_from_slice(&buf[..n]);
                    if raw.contains(&REPLY_PROMPT) || raw.contains(&REBOOT_MARKER) {
                        return Ok(String::from_utf8_lossy(&raw).into_owned());
                    }
                }
                Ok(Err(Error::Timeout)) | Err(_) => {
                    // Quiet link; keep waiting until the deadline (if any).
                }
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    /// Update the reboot flag and retire the echoed command id, if any.
    fn classify(&mut self, raw: &str) {
        if raw == REBOOT_ACK {
            // The controller restarted; there is no command to retire.
            warn!("specMech rebooted, acknowledgment required");
            self.reboot_pending = true;
            return;
        }
        self.reboot_pending = false;

        match sentence::correlation_id(raw) {
            Ok(Some(id)) => {
                if !self.queue.retire(id) {
                    warn!(id, "reply correlates to no outstanding command");
                }
            }
            Ok(None) => debug!("reply carries no telemetry sentences"),
            Err(e) => {
                // Degrade to "no correlation"; the orphaned entry stays
                // until a later reply retires it.
                warn!(error = %e, "could not correlate reply, queue unchanged");
            }
        }
    }
}
