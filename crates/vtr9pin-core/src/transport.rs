//! Transport trait for device communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a transport
//! device. The production implementation wraps an RS-422 serial port (via
//! a USB adapter); a mock implementation in `vtr9pin-test-harness` makes
//! the protocol engine testable without hardware.
//!
//! The engine operates on a `Box<dyn Transport>` and is the sole reader of
//! the channel; callers never touch the byte stream directly.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a device.
///
/// Implementations handle buffering and error mapping at the physical
/// layer. Frame assembly, checksum validation, and timing enforcement are
/// handled by the protocol engine that consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the device.
    ///
    /// Implementations should block until all bytes have been written to
    /// the underlying transport.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the device into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if no data is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Discard any bytes buffered on the receive side.
    ///
    /// The engine calls this before each send so a late straggler from a
    /// previous exchange cannot be mistaken for the new response.
    async fn discard_buffers(&mut self) -> Result<()>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
