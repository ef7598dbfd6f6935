//! Serial transport for specMech communication.
//!
//! On the bench the controller is reached over its serial console rather
//! than the instrument LAN. [`SerialTransport`] implements the
//! [`Transport`] trait for that connection; the console runs 9600 8N1.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, trace, warn};

use specmech_core::{Error, Result, Transport};

/// Line settings for the console connection.
///
/// The defaults are what the controller ships with: 9600 baud, 8 data
/// bits, 1 stop bit, no parity, no flow control.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
    pub flow_control: tokio_serial::FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baud_rate: 9600,
            data_bits: tokio_serial::DataBits::Eight,
            stop_bits: tokio_serial::StopBits::One,
            parity: tokio_serial::Parity::None,
            flow_control: tokio_serial::FlowControl::None,
        }
    }
}

/// Serial transport for the controller's console port.
#[derive(Debug)]
pub struct SerialTransport {
    // None once close() has run.
    port: Option<SerialStream>,
    port_name: String,
}

impl SerialTransport {
    /// Open `port` (a path like `/dev/ttyUSB0`, or `COM3` on Windows) at
    /// the given baud rate, with the remaining line settings defaulted.
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..SerialConfig::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a serial port with explicit line settings.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        debug!(port = %port, baud_rate = config.baud_rate, "opening serial console");

        let builder = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .parity(config.parity)
            .flow_control(config.flow_control);

        let stream = match builder.open_native_async() {
            Ok(stream) => stream,
            Err(e) => {
                warn!(port = %port, error = %e, "could not open serial port");
                return Err(Error::Connection(format!(
                    "failed to open serial port {port}: {e}"
                )));
            }
        };

        info!(port = %port, baud_rate = config.baud_rate, "serial console opened");

        Ok(Self {
            port: Some(stream),
            port_name: port.to_string(),
        })
    }

    /// The path of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        trace!(port = %self.port_name, bytes = data.len(), data = ?data, "sending");

        port.write_all(data).await.map_err(console_error)?;
        port.flush().await.map_err(console_error)?;
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        let read = tokio::time::timeout(timeout, port.read(buf));
        match read.await {
            Ok(Ok(n)) => {
                trace!(port = %self.port_name, bytes = n, data = ?&buf[..n], "received");
                Ok(n)
            }
            Ok(Err(e)) => {
                warn!(port = %self.port_name, error = %e, "receive failed");
                Err(console_error(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut port) = self.port.take() else {
            return Ok(());
        };

        debug!(port = %self.port_name, "closing serial console");
        if let Err(e) = port.flush().await {
            warn!(port = %self.port_name, error = %e, "flush on close failed, continuing");
        }
        // Dropping the stream releases the port.
        info!(port = %self.port_name, "serial console closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

/// A yanked USB adapter shows up as one of the gone-away kinds; anything
/// else stays an I/O error.
fn console_error(e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::NotConnected => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_line_settings_match_the_console() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, tokio_serial::DataBits::Eight);
        assert_eq!(config.stop_bits, tokio_serial::StopBits::One);
        assert_eq!(config.parity, tokio_serial::Parity::None);
        assert_eq!(config.flow_control, tokio_serial::FlowControl::None);
    }

    #[tokio::test]
    async fn open_nonexistent_port_is_a_connection_error() {
        let result = SerialTransport::open("/dev/does-not-exist", 9600).await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }
}
