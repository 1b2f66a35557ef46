//! Transport implementation for vtr9pin.
//!
//! This crate provides the concrete implementation of the
//! [`Transport`](vtr9pin_core::Transport) trait from `vtr9pin-core` for
//! RS-422 serial links, plus serial port enumeration for discovery.
//!
//! # Example
//!
//! ```no_run
//! use vtr9pin_transport::SerialTransport;
//! use vtr9pin_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> vtr9pin_core::Result<()> {
//! // Open the RS-422 link with protocol defaults (38400 8-O-1)
//! let mut transport = SerialTransport::open("/dev/ttyUSB0").await?;
//!
//! // Send a command frame
//! transport.send(&[0x20, 0x01, 0x21]).await?;
//!
//! // Receive response
//! let mut buf = [0u8; 32];
//! let n = transport.receive(&mut buf, Duration::from_millis(12)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{list_ports, DataBits, Parity, SerialConfig, SerialTransport, StopBits};
