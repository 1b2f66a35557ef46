//! vtr9pin-test-harness: Test utilities and the mock transport for vtr9pin.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the protocol engine without requiring real VTR hardware.

pub mod mock_serial;

pub use mock_serial::MockTransport;
