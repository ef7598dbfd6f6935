//! Scripted in-memory transport for session-driver tests.
//!
//! [`MockTransport`] plays the controller's side of a conversation from a
//! script of request/reply pairs, so command framing, the
//! accumulate-until-terminator read loop, and reply classification can all
//! be tested without a controller on the other end.
//!
//! # Example
//!
//! ```
//! use specmech_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the session sends this command, serve this reply.
//! mock.expect("rv;1\r", "$S2VER,2021-09.17,1*33\r\x00\n>");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use specmech_core::{Error, Result, Transport};

/// Bytes queued for `receive()`, with delivery-shaping knobs.
#[derive(Debug)]
struct Reply {
    bytes: Vec<u8>,
    served: usize,
    /// Serve at most this many bytes per read.
    chunk: Option<usize>,
    /// Sleep this long before the first byte goes out.
    delay: Option<Duration>,
}

impl Reply {
    fn whole(bytes: Vec<u8>) -> Self {
        Reply {
            bytes,
            served: 0,
            chunk: None,
            delay: None,
        }
    }
}

/// One scripted exchange: the exact command line we expect the session to
/// transmit, and the reply to serve once it has.
#[derive(Debug)]
struct Exchange {
    sent: Vec<u8>,
    reply: Reply,
}

/// A scripted [`Transport`] standing in for the controller.
///
/// Exchanges are consumed in script order: each `send()` is recorded,
/// checked against the next expected command, and arms its reply for the
/// `receive()` calls that follow. A reply can be throttled to N bytes per
/// read (to push the caller's accumulate loop through several reads) or
/// held back by a delay (to keep a cycle in flight while another task
/// probes the session).
///
/// Driving the mock off its script, or past the end of it, is an error.
#[derive(Debug)]
pub struct MockTransport {
    script: VecDeque<Exchange>,
    /// Armed replies, served in order by `receive()`.
    inbox: VecDeque<Reply>,
    connected: bool,
    sent: Vec<Vec<u8>>,
}

impl MockTransport {
    /// A fresh, connected mock with an empty script.
    pub fn new() -> Self {
        MockTransport {
            script: VecDeque::new(),
            inbox: VecDeque::new(),
            connected: true,
            sent: Vec::new(),
        }
    }

    fn push_exchange(&mut self, request: &str, reply: Reply) {
        self.script.push_back(Exchange {
            sent: request.as_bytes().to_vec(),
            reply,
        });
    }

    /// Script an exchange: when the session sends `request`, serve
    /// `response` to the reads that follow.
    pub fn expect(&mut self, request: &str, response: &str) {
        self.push_exchange(request, Reply::whole(response.as_bytes().to_vec()));
    }

    /// Script an exchange whose reply dribbles out `chunk_size` bytes per
    /// read, so the reader has to accumulate across several `receive()`
    /// calls before it sees a terminator.
    pub fn expect_chunked(&mut self, request: &str, response: &str, chunk_size: usize) {
        let reply = Reply {
            chunk: Some(chunk_size),
            ..Reply::whole(response.as_bytes().to_vec())
        };
        self.push_exchange(request, reply);
    }

    /// Script an exchange whose reply only starts arriving after `delay`.
    pub fn expect_delayed(&mut self, request: &str, response: &str, delay: Duration) {
        let reply = Reply {
            delay: Some(delay),
            ..Reply::whole(response.as_bytes().to_vec())
        };
        self.push_exchange(request, reply);
    }

    /// Arm bytes for `receive()` directly, ahead of any scripted reply and
    /// with no matching request.
    ///
    /// This models data the controller emits on its own, such as the `!`
    /// reboot marker.
    pub fn push_unsolicited(&mut self, data: &str) {
        self.inbox.push_front(Reply::whole(data.as_bytes().to_vec()));
    }

    /// Everything sent through this transport, one element per `send()`.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// How many scripted exchanges have not been consumed yet.
    pub fn remaining_expectations(&self) -> usize {
        self.script.len()
    }

    /// Flip the connected state.
    ///
    /// While disconnected, `send()` and `receive()` report
    /// [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent.push(data.to_vec());

        let exchange = self
            .script
            .pop_front()
            .ok_or_else(|| off_script("mock transport script is exhausted".into()))?;

        if data != exchange.sent.as_slice() {
            return Err(off_script(format!(
                "unexpected send data: scripted {:?}, got {:?}",
                String::from_utf8_lossy(&exchange.sent),
                String::from_utf8_lossy(data)
            )));
        }

        self.inbox.push_back(exchange.reply);
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        let Some(reply) = self.inbox.front_mut() else {
            return Err(Error::Timeout);
        };

        if let Some(delay) = reply.delay.take() {
            tokio::time::sleep(delay).await;
        }

        let left = &reply.bytes[reply.served..];
        if left.is_empty() {
            self.inbox.pop_front();
            return Err(Error::Timeout);
        }

        let n = match reply.chunk {
            Some(chunk) => left.len().min(buf.len()).min(chunk),
            None => left.len().min(buf.len()),
        };
        buf[..n].copy_from_slice(&left[..n]);
        reply.served += n;
        if reply.served == reply.bytes.len() {
            self.inbox.pop_front();
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.inbox.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// The gateway error enum has no mock-specific variant, so script
/// violations surface as `InvalidData` I/O errors.
fn off_script(msg: String) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_send_receive() {
        let mut mock = MockTransport::new();
        let request = "rd;1\r";
        let response = "$S2PNU,c,c,c,1,1*06\r\x00\n>";

        mock.expect(request, response);

        mock.send(request.as_bytes()).await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(&buf[..n], response.as_bytes());
    }

    #[tokio::test]
    async fn tracks_sent_data() {
        let mut mock = MockTransport::new();
        mock.expect("st;1\r", ">");
        mock.expect("st;2\r", ">");

        mock.send(b"st;1\r").await.unwrap();
        mock.send(b"st;2\r").await.unwrap();

        assert_eq!(mock.sent_data().len(), 2);
        assert_eq!(mock.sent_data()[0], b"st;1\r");
        assert_eq!(mock.sent_data()[1], b"st;2\r");
    }

    #[tokio::test]
    async fn wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect("st;1\r", ">");

        let result = mock.send(b"rd;1\r").await;
        assert!(matches!(result.unwrap_err(), Error::Io(_)));
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let mut mock = MockTransport::new();

        let result = mock.send(b"st;1\r").await;
        assert!(matches!(result.unwrap_err(), Error::Io(_)));
    }

    #[tokio::test]
    async fn receive_without_send_times_out() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 64];

        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn chunked_reply_spans_several_reads() {
        let mut mock = MockTransport::new();
        let response = "$S2MRA,1200,1*2F\r\x00\n>";
        mock.expect_chunked("mr;1\r", response, 4);

        mock.send(b"mr;1\r").await.unwrap();

        let mut assembled = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            match mock.receive(&mut buf, Duration::from_millis(10)).await {
                Ok(n) => {
                    assert!(n <= 4);
                    assembled.extend_from_slice(&buf[..n]);
                }
                Err(Error::Timeout) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(assembled, response.as_bytes());
    }

    #[tokio::test]
    async fn unsolicited_data_is_served_before_scripted_replies() {
        let mut mock = MockTransport::new();
        mock.expect("st;1\r", ">");
        mock.push_unsolicited("!");

        mock.send(b"st;1\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"!");

        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b">");
    }

    #[tokio::test]
    async fn disconnect() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());

        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = mock.send(b"st;1\r").await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn remaining_expectations_counts_down() {
        let mut mock = MockTransport::new();
        mock.expect("st;1\r", ">");
        mock.expect("st;2\r", ">");
        assert_eq!(mock.remaining_expectations(), 2);

        mock.send(b"st;1\r").await.unwrap();
        assert_eq!(mock.remaining_expectations(), 1);

        mock.send(b"st;2\r").await.unwrap();
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn small_read_buffer_is_respected() {
        let mut mock = MockTransport::new();
        mock.expect("st;1\r", "abcd>");

        mock.send(b"st;1\r").await.unwrap();

        let mut buf = [0u8; 2];
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"ab");

        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"cd");
    }
}
