//! vtr9pin-core: Core traits, types, and error definitions for vtr9pin.
//!
//! This crate defines the device-agnostic abstractions the protocol engine
//! is built on. Automation controllers and other applications depend on
//! these types without pulling in the engine or any serial I/O.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`VtrEvent`] -- asynchronous state change notifications
//! - [`TimeCode`] / [`StatusData`] -- decoded device telemetry
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use vtr9pin_core::*`.
pub use error::{Error, Result};
pub use events::VtrEvent;
pub use transport::Transport;
pub use types::*;
