//! # vtr9pin
//!
//! Async Rust library for controlling VTRs and disk recorders over the
//! Sony 9-pin (RS-422) remote protocol.
//!
//! This facade crate re-exports the pieces of the workspace most hosts
//! need:
//!
//! - [`MasterBuilder`] / [`VtrMaster`] — connect to a device and drive it
//! - [`commands`] — builders for the standard command set
//! - [`VtrEvent`] — the engine's broadcast telemetry events
//! - [`SerialTransport`] / [`Transport`] — the RS-422 link and its trait
//! - [`discover`] / [`probe_port`] — find devices on this system
//!
//! # Quick start
//!
//! ```no_run
//! use vtr9pin::{commands, MasterBuilder, VtrEvent};
//!
//! #[tokio::main]
//! async fn main() -> vtr9pin::Result<()> {
//!     let master = MasterBuilder::new()
//!         .serial_port("/dev/ttyUSB0")
//!         .build()
//!         .await?;
//!
//!     println!("connected to {}", master.device_info().await);
//!
//!     let mut events = master.subscribe();
//!     master.send(&commands::play()).await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let VtrEvent::TimeChanged { timecode, .. } = event {
//!             println!("{timecode}");
//!         }
//!     }
//!
//!     master.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The link is half duplex with at most one outstanding request, so the
//! engine funnels every command through a single exchange pump task that
//! owns the transport. Between host commands an idle poller keeps the
//! status and timecode caches fresh; cache changes fan out through a
//! broadcast event channel.

pub use vtr9pin_core::error::{Error, Result};
pub use vtr9pin_core::events::VtrEvent;
pub use vtr9pin_core::transport::Transport;
pub use vtr9pin_core::types::{
    ConnectionState, DeviceInfo, NakCauses, StatusData, TimeCode, TimeSource,
};

pub use vtr9pin_transport::{list_ports, SerialConfig, SerialTransport};

pub use vtr9pin_protocol::{
    commands, discover, frame, probe_port, probe_transport, Frame, MasterBuilder,
    TimeSenseRequest, VtrMaster,
};
