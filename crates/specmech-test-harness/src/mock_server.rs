//! Mock specMech controller for end-to-end testing over TCP.
//!
//! [`MockMechServer`] is a real TCP listener speaking the specMech wire
//! format: it reads `\r`-terminated command lines and answers with scripted
//! replies, so a `TcpTransport` plus the session driver can be exercised
//! end to end without hardware.
//!
//! Two modes:
//!
//! - **Scripted** ([`start`](MockMechServer::start)): expectations are
//!   consumed in order; a mismatch fails the script. A scripted connection
//!   drop lets reconnect paths be tested.
//! - **Emulator** ([`start_emulator`](MockMechServer::start_emulator)): any
//!   correlated command is answered with a canned status block echoing the
//!   command id, the way the observatory's specMech emulator does.

use std::collections::VecDeque;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use specmech_core::{Error, Result};

/// What the server does once the expected command line has been read.
#[derive(Debug, Clone)]
enum Action {
    /// Write these bytes back to the client.
    Reply(Vec<u8>),
    /// Drop the connection; the next step accepts a fresh one.
    Drop,
}

/// One step of the scripted conversation.
#[derive(Debug, Clone)]
struct Step {
    /// The expected command line, without the trailing `\r`.
    request: String,
    action: Action,
}

/// A mock specMech controller listening on localhost.
///
/// Bind first, load the script, then call [`start`](MockMechServer::start)
/// (or [`start_emulator`](MockMechServer::start_emulator)) and connect a
/// transport to [`addr`](MockMechServer::addr). After the client is done,
/// [`wait`](MockMechServer::wait) reports whether the whole script was
/// honored.
pub struct MockMechServer {
    listener: Option<TcpListener>,
    addr: String,
    script: VecDeque<Step>,
    handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockMechServer {
    /// Bind a listener on a random localhost port.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Connection(format!("failed to bind mock controller: {e}")))?;
        let addr = listener.local_addr().map_err(Error::Io)?.to_string();

        Ok(Self {
            listener: Some(listener),
            addr,
            script: VecDeque::new(),
            handle: None,
        })
    }

    /// The address the server is listening on (e.g. `127.0.0.1:54321`).
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Script a reply: when the client sends `request` (terminated by `\r`),
    /// answer with `response` verbatim.
    pub fn expect(&mut self, request: &str, response: &str) {
        self.script.push_back(Step {
            request: request.to_string(),
            action: Action::Reply(response.as_bytes().to_vec()),
        });
    }

    /// Script a connection drop: when the client sends `request`, close the
    /// socket without replying. The following step accepts a new connection.
    pub fn expect_drop(&mut self, request: &str) {
        self.script.push_back(Step {
            request: request.to_string(),
            action: Action::Drop,
        });
    }

    /// Start the scripted server in a background task.
    ///
    /// Connections are accepted as the script requires: one at first, and a
    /// fresh one after every scripted drop.
    pub fn start(&mut self) {
        let listener = self.listener.take().expect("server already started");
        let script: Vec<Step> = self.script.drain(..).collect();

        self.handle = Some(tokio::spawn(async move {
            let mut stream: Option<TcpStream> = None;

            for (i, step) in script.iter().enumerate() {
                if stream.is_none() {
                    let (accepted, _) = listener
                        .accept()
                        .await
                        .map_err(|e| format!("step {i}: accept failed: {e}"))?;
                    stream = Some(accepted);
                }
                let s = stream.as_mut().expect("stream accepted above");

                let line = read_command_line(s)
                    .await
                    .map_err(|e| format!("step {i}: {e}"))?;
                if line != step.request {
                    return Err(format!(
                        "step {i}: expected {:?}, got {:?}",
                        step.request, line
                    ));
                }

                match &step.action {
                    Action::Reply(response) => {
                        s.write_all(response)
                            .await
                            .map_err(|e| format!("step {i}: write failed: {e}"))?;
                        s.flush()
                            .await
                            .map_err(|e| format!("step {i}: flush failed: {e}"))?;
                    }
                    Action::Drop => {
                        stream = None;
                    }
                }
            }

            Ok(())
        }));
    }

    /// Start the emulator in a background task.
    ///
    /// Accepts a single connection and answers every correlated command with
    /// [`canned_status`] until the client sends the quit command or hangs
    /// up. A bare `!` acknowledgment is answered with the prompt alone.
    pub fn start_emulator(&mut self) {
        let listener = self.listener.take().expect("server already started");

        self.handle = Some(tokio::spawn(async move {
            let (mut stream, _) = listener
                .accept()
                .await
                .map_err(|e| format!("emulator: accept failed: {e}"))?;

            loop {
                let line = match read_command_line(&mut stream).await {
                    Ok(line) => line,
                    // Client hung up; a clean end of session.
                    Err(_) => return Ok(()),
                };

                if line == "!" {
                    stream
                        .write_all(b">")
                        .await
                        .map_err(|e| format!("emulator: write failed: {e}"))?;
                    continue;
                }

                let (verb, id) = match line.rsplit_once(';') {
                    Some((verb, id)) => (verb, id),
                    None => (line.as_str(), ""),
                };
                if verb == "q" {
                    return Ok(());
                }

                let reply = canned_status(id);
                stream
                    .write_all(reply.as_bytes())
                    .await
                    .map_err(|e| format!("emulator: write failed: {e}"))?;
                stream
                    .flush()
                    .await
                    .map_err(|e| format!("emulator: flush failed: {e}"))?;
            }
        }));
    }

    /// Wait for the server task to finish and surface any script violation.
    ///
    /// Call this after the client has finished its side of the conversation.
    pub async fn wait(self) -> std::result::Result<(), String> {
        match self.handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {e}"))?,
            None => Ok(()),
        }
    }
}

/// Read one `\r`-terminated command line, returned without the terminator.
async fn read_command_line(stream: &mut TcpStream) -> std::result::Result<String, String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream
            .read(&mut byte)
            .await
            .map_err(|e| format!("read failed: {e}"))?;
        if n == 0 {
            return Err(format!(
                "client disconnected mid-command after {:?}",
                String::from_utf8_lossy(&line)
            ));
        }
        if byte[0] == b'\r' {
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
        line.push(byte[0]);
    }
}

/// Frame a sentence body as the controller would: sentinel prefix plus the
/// XOR checksum of everything between the `$` and the `*`.
fn frame_sentence(body: &str) -> String {
    let payload = format!("S2{body}");
    let checksum = payload.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${payload}*{checksum:02X}")
}

/// A full canned status reply, every sentence trailing the given command id.
pub fn canned_status(id: &str) -> String {
    let bodies = [
        format!("MRA,1200,{id}"),
        format!("MRB,-420,{id}"),
        format!("MRC,873,{id}"),
        format!("ENV,21.3,43.0,20.9,44.1,21.5,41.8,{id}"),
        format!("PNU,c,c,c,1,{id}"),
        format!("ION,1,1,{id}"),
        format!("ACC,0.01,-0.02,0.99,{id}"),
        format!("TIM,2021-01-01T00:00:00,2020-12-31T23:00:00,{id}"),
        format!("VER,2021-09.17,{id}"),
    ];

    let mut reply = String::new();
    for body in &bodies {
        reply.push_str(&frame_sentence(body));
        reply.push_str("\r\x00\n");
    }
    reply.push('>');
    reply
}
