//! Error types for vtr9pin.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! engine-layer errors are all captured here.

use crate::types::NakCauses;

/// The error type for all vtr9pin operations.
///
/// Variants cover the full range of failure modes encountered when driving
/// a transport device over the 9-pin remote interface: physical transport
/// failures, frame decode errors, response timeouts, and device rejections.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open/configure failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed frame, unexpected response layout).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No complete response frame arrived within the per-exchange budget.
    ///
    /// The device is required to start answering within single-digit
    /// milliseconds; missing that window marks the link unhealthy but does
    /// not tear down the connection.
    #[error("timeout waiting for response")]
    Timeout,

    /// The device explicitly rejected the command with a NAK.
    ///
    /// Carries the decoded error-cause flags so callers can decide on a
    /// per-cause policy (back off, resend, give up). The engine itself
    /// never retries on NAK.
    #[error("device rejected command: {0}")]
    Nak(NakCauses),

    /// A command was built with an out-of-range operand payload.
    ///
    /// Rejected before any I/O takes place.
    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    /// No connection to the device has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// The connection was closed while a request was in flight.
    #[error("request cancelled by connection close")]
    Cancelled,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
