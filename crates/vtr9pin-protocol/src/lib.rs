//! 9-pin (RS-422) remote protocol engine — master side.
//!
//! This crate implements the controlling end of the 9-pin serial remote
//! protocol used by studio VTRs and their modern replacements: frame
//! encoding and decoding, command builders, the single-outstanding-request
//! exchange pump, response dispatch into telemetry caches and events, the
//! idle poll that keeps those caches fresh, and port discovery.
//!
//! Most hosts only need [`MasterBuilder`] to connect and [`VtrMaster`] to
//! drive the device:
//!
//! ```no_run
//! use vtr9pin_protocol::{commands, MasterBuilder};
//!
//! # async fn example() -> vtr9pin_core::Result<()> {
//! let master = MasterBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .build()
//!     .await?;
//!
//! master.send(&commands::play()).await?;
//! println!("rolling from {}", master.timecode().await);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod commands;
pub mod device;
mod dispatch;
mod exchange;
pub mod discovery;
pub mod frame;
pub mod master;

pub use builder::{
    MasterBuilder, DEFAULT_COMMAND_TIMEOUT, IDLE_POLL_PERIOD, JITTER_MARGIN, RESPONSE_BUDGET,
};
pub use commands::TimeSenseRequest;
pub use discovery::{discover, probe_port, probe_transport};
pub use frame::{DecodeResult, Frame};
pub use master::VtrMaster;
