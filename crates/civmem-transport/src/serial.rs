//! Serial port transport for CI-V.
//!
//! CI-V is a single-wire, half-duplex bus run at 8 data bits, no parity and
//! one stop bit. Radios with a USB port expose the same bus as a virtual COM
//! port. In both cases every byte the host sends is also received back (the
//! echo), which is handled one layer up by the CI-V link, not here.

use async_trait::async_trait;
use civmem_core::error::{Error, Result};
use civmem_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

/// Baud rates selectable in the CI-V menu of current Icom radios.
pub const CIV_BAUD_RATES: &[u32] = &[4800, 9600, 19_200, 38_400, 57_600, 115_200];

/// Serial port configuration.
///
/// Data bits are always eight on CI-V, so only the line parameters that
/// some level converters need changed are exposed.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate; must be one of [`CIV_BAUD_RATES`].
    pub baud_rate: u32,
    /// Number of stop bits (one on every Icom radio).
    pub stop_bits: StopBits,
    /// Parity checking (none on every Icom radio).
    pub parity: Parity,
    /// De-assert DTR and RTS after opening.
    ///
    /// On the USB port these lines are routed to keying and PTT inputs, so
    /// leaving them asserted can key the transmitter. Some externally
    /// powered CI-V converters draw power from DTR and need this off.
    pub release_control_lines: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            stop_bits: StopBits::One,
            parity: Parity::None,
            release_control_lines: true,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

fn link_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::UnexpectedEof => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

/// Serial port transport to a radio's CI-V port.
pub struct SerialTransport {
    port: Option<SerialStream>,
    port_name: String,
}

impl SerialTransport {
    /// Open a serial port at `baud_rate`, 8N1, with DTR/RTS released.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use civmem_transport::SerialTransport;
    /// # async fn example() -> civmem_core::Result<()> {
    /// let transport = SerialTransport::open("COM3", 19_200).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a serial port with full configuration control.
    ///
    /// Fails with [`Error::InvalidParameter`] for a baud rate the CI-V menu
    /// does not offer and with [`Error::Transport`] if the port cannot be
    /// opened.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        if !CIV_BAUD_RATES.contains(&config.baud_rate) {
            return Err(Error::InvalidParameter(format!(
                "unsupported CI-V baud rate {}",
                config.baud_rate
            )));
        }

        tracing::debug!(
            port = %port,
            baud_rate = config.baud_rate,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            "Opening serial port"
        );

        let mut stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "Failed to open serial port");
                Error::Transport(format!("failed to open serial port {port}: {e}"))
            })?;

        if config.release_control_lines {
            if let Err(e) = stream.write_data_terminal_ready(false) {
                tracing::warn!(port = %port, error = %e, "Failed to de-assert DTR");
            }
            if let Err(e) = stream.write_request_to_send(false) {
                tracing::warn!(port = %port, error = %e, "Failed to de-assert RTS");
            }
        }

        // Anything the radio sent before we opened belongs to nobody.
        if let Err(e) = stream.clear(ClearBuffer::Input) {
            tracing::warn!(port = %port, error = %e, "Failed to clear input buffer");
        }

        tracing::info!(port = %port, baud_rate = config.baud_rate, "Serial port opened");

        Ok(Self {
            port: Some(stream),
            port_name: port.to_string(),
        })
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(port = %self.port_name, data = ?data, "TX");

        port.write_all(data).await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Write failed");
            link_error(e)
        })?;
        port.flush().await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Flush failed");
            link_error(e)
        })?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, port.read(buf)).await {
            Ok(Ok(0)) => {
                tracing::error!(port = %self.port_name, "Serial port returned end of stream");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(port = %self.port_name, data = ?&buf[..n], "RX");
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(port = %self.port_name, error = %e, "Read failed");
                Err(link_error(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn discard_input(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        port.clear(ClearBuffer::Input).map_err(|e| {
            Error::Transport(format!("failed to clear input on {}: {e}", self.port_name))
        })?;
        tracing::trace!(port = %self.port_name, "Input buffer cleared");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing"
                );
            }
            tracing::info!(port = %self.port_name, "Serial port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.port.is_some() {
            tracing::debug!(port = %self.port_name, "SerialTransport dropped while open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_civ_8n1() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.parity, Parity::None);
        assert!(config.release_control_lines);
    }

    #[test]
    fn default_baud_is_a_civ_rate() {
        assert!(CIV_BAUD_RATES.contains(&SerialConfig::default().baud_rate));
    }

    #[tokio::test]
    async fn open_rejects_non_civ_baud_rate() {
        let result = SerialTransport::open("/dev/null-civmem", 12_345).await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn open_missing_port_is_transport_error() {
        let result = SerialTransport::open("/dev/civmem-does-not-exist", 115_200).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[test]
    fn io_error_classification() {
        let lost = link_error(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(matches!(lost, Error::ConnectionLost));
        let other = link_error(std::io::Error::from(std::io::ErrorKind::InvalidData));
        assert!(matches!(other, Error::Io(_)));
    }
}
