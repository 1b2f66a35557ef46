//! Serial port transport for device communication.
//!
//! This module provides [`SerialTransport`], which implements the
//! [`Transport`] trait for RS-422 serial links, usually reached through a
//! USB adapter presenting as a virtual COM port.
//!
//! The 9-pin remote protocol runs the link at 38400 baud, 8 data bits,
//! odd parity, 1 stop bit. Those are the defaults here; every parameter is
//! overridable through [`SerialConfig`] for adapters or devices that
//! deviate.
//!
//! # Example
//!
//! ```no_run
//! use vtr9pin_transport::SerialTransport;
//! use vtr9pin_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> vtr9pin_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0").await?;
//!
//! // Device-type request
//! transport.send(&[0x00, 0x11, 0x11]).await?;
//!
//! // Receive response with a 12 ms deadline
//! let mut buf = [0u8; 32];
//! let n = transport.receive(&mut buf, Duration::from_millis(12)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use vtr9pin_core::error::{Error, Result};
use vtr9pin_core::transport::Transport;

/// Serial port configuration.
///
/// Defaults follow the 9-pin remote electrical convention:
/// - 38400 baud
/// - 8 data bits
/// - 1 stop bit
/// - Odd parity
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate (38400 for compliant devices).
    pub baud_rate: u32,
    /// Number of data bits (typically 8).
    pub data_bits: DataBits,
    /// Number of stop bits (typically 1).
    pub stop_bits: StopBits,
    /// Parity checking (odd per the protocol convention).
    pub parity: Parity,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 38_400,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::Odd,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
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

/// List the serial port names present on this system.
///
/// Thin wrapper over the platform enumeration; returns the device paths
/// (e.g. `/dev/ttyUSB0`, `COM3`) that can be passed to
/// [`SerialTransport::open`]. Which of them actually have a 9-pin device
/// attached is a question for the protocol layer's probe.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| Error::Transport(format!("failed to enumerate serial ports: {e}")))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Serial port transport for device communication.
///
/// Implements the [`Transport`] trait over an RS-422 link reached through
/// a native or USB serial port.
pub struct SerialTransport {
    /// The underlying serial port stream.
    port: Option<SerialStream>,
    /// Port name for logging/debugging.
    port_name: String,
}

impl SerialTransport {
    /// Open a serial port with the protocol's default settings
    /// (38400 baud, 8 data bits, odd parity, 1 stop bit).
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use vtr9pin_transport::SerialTransport;
    /// # async fn example() -> vtr9pin_core::Result<()> {
    /// let transport = SerialTransport::open("/dev/ttyUSB0").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(port: &str) -> Result<Self> {
        Self::open_with_config(port, SerialConfig::default()).await
    }

    /// Open a serial port with full configuration control.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path
    /// * `config` - Full serial port configuration
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(
            port = %port,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            "Opening serial port"
        );

        let serial_stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "Failed to open serial port");
                Error::Transport(format!("Failed to open serial port {}: {}", port, e))
            })?;

        // Drop whatever the adapter buffered before we got here. The first
        // exchange must not see bytes from a previous session.
        if let Err(e) = serial_stream.clear(ClearBuffer::All) {
            tracing::warn!(port = %port, error = %e, "Failed to clear serial buffers on open");
        }

        tracing::info!(port = %port, baud_rate = config.baud_rate, "Serial port opened successfully");

        Ok(Self {
            port: Some(serial_stream),
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

        tracing::trace!(
            port = %self.port_name,
            bytes = data.len(),
            data = ?data,
            "Sending data"
        );

        port.write_all(data).await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to send data");
            if e.kind() == std::io::ErrorKind::BrokenPipe
                || e.kind() == std::io::ErrorKind::NotConnected
            {
                Error::ConnectionLost
            } else {
                Error::Io(e)
            }
        })?;

        // Flush so the command leaves the adapter immediately; the response
        // timing budget starts counting from here.
        port.flush().await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to flush serial port");
            Error::Io(e)
        })?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        let result = tokio::time::timeout(timeout, port.read(buf)).await;

        match result {
            // A zero-length read from a serial stream is end-of-file: the
            // adapter was unplugged or the port torn down underneath us.
            Ok(Ok(0)) => {
                tracing::error!(port = %self.port_name, "Serial port reached end-of-file");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(
                    port = %self.port_name,
                    bytes = n,
                    data = ?&buf[..n],
                    "Received data"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(port = %self.port_name, error = %e, "Failed to receive data");
                if e.kind() == std::io::ErrorKind::BrokenPipe
                    || e.kind() == std::io::ErrorKind::NotConnected
                {
                    Err(Error::ConnectionLost)
                } else {
                    Err(Error::Io(e))
                }
            }
            Err(_) => {
                tracing::trace!(
                    port = %self.port_name,
                    timeout_ms = timeout.as_millis(),
                    "Timeout waiting for data"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn discard_buffers(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        port.clear(ClearBuffer::All).map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to clear serial buffers");
            Error::Transport(format!("failed to clear buffers: {e}"))
        })
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            tracing::debug!(port = %self.port_name, "Closing serial port");

            if let Err(e) = port.flush().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing (continuing anyway)"
                );
            }

            // The port is dropped here, which closes it.
            tracing::info!(port = %self.port_name, "Serial port closed");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}
