//! Builder for configuring and connecting a [`VtrMaster`].
//!
//! ```no_run
//! use vtr9pin_protocol::MasterBuilder;
//!
//! # async fn example() -> vtr9pin_core::Result<()> {
//! let master = MasterBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use vtr9pin_core::transport::Transport;
use vtr9pin_core::{Error, Result};
use vtr9pin_transport::{SerialConfig, SerialTransport};

use crate::master::{MasterOptions, VtrMaster};

/// How long a compliant device may take to deliver its full response,
/// measured from the end of the command.
pub const RESPONSE_BUDGET: Duration = Duration::from_millis(9);

/// Default slack added to the response budget for adapter and scheduler
/// jitter.
pub const JITTER_MARGIN: Duration = Duration::from_millis(3);

/// Default safety-net timeout for one full round trip.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(500);

/// Default period of the idle telemetry poll.
pub const IDLE_POLL_PERIOD: Duration = Duration::from_millis(5);

/// Builder for a [`VtrMaster`].
///
/// Defaults follow the protocol timing conventions; tests and unusual
/// adapters can widen them.
#[derive(Debug, Clone)]
pub struct MasterBuilder {
    serial_port: Option<String>,
    serial_config: SerialConfig,
    response_budget: Duration,
    jitter_margin: Duration,
    command_timeout: Duration,
    idle_poll_period: Duration,
    idle_poll: bool,
}

impl Default for MasterBuilder {
    fn default() -> Self {
        MasterBuilder {
            serial_port: None,
            serial_config: SerialConfig::default(),
            response_budget: RESPONSE_BUDGET,
            jitter_margin: JITTER_MARGIN,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            idle_poll_period: IDLE_POLL_PERIOD,
            idle_poll: true,
        }
    }
}

impl MasterBuilder {
    /// Create a builder with protocol-default timing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the serial port path to open (e.g. `/dev/ttyUSB0`, `COM3`).
    pub fn serial_port(mut self, port: impl Into<String>) -> Self {
        self.serial_port = Some(port.into());
        self
    }

    /// Override the serial line parameters (default 38400 8-O-1).
    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial_config = config;
        self
    }

    /// Override how long the device may take to deliver its response.
    pub fn response_budget(mut self, budget: Duration) -> Self {
        self.response_budget = budget;
        self
    }

    /// Override the jitter slack added to the response budget.
    pub fn jitter_margin(mut self, margin: Duration) -> Self {
        self.jitter_margin = margin;
        self
    }

    /// Override the safety-net timeout for one full round trip.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Override the idle poll period.
    pub fn idle_poll_period(mut self, period: Duration) -> Self {
        self.idle_poll_period = period;
        self
    }

    /// Enable or disable the idle telemetry poll (enabled by default).
    pub fn idle_poll(mut self, enabled: bool) -> Self {
        self.idle_poll = enabled;
        self
    }

    fn options(&self) -> MasterOptions {
        MasterOptions {
            response_budget: self.response_budget,
            jitter_margin: self.jitter_margin,
            command_timeout: self.command_timeout,
            idle_poll_period: self.idle_poll_period,
            idle_poll: self.idle_poll,
        }
    }

    /// Open the configured serial port and connect.
    pub async fn build(self) -> Result<VtrMaster> {
        let port = self
            .serial_port
            .as_deref()
            .ok_or_else(|| Error::Transport("no serial port configured".into()))?;
        let transport =
            SerialTransport::open_with_config(port, self.serial_config.clone()).await?;
        self.build_with_transport(Box::new(transport)).await
    }

    /// Connect over an already-open transport.
    ///
    /// Used for non-serial links and for testing against a mock. Runs the
    /// identity probe before returning; on probe failure the transport is
    /// closed and dropped.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<VtrMaster> {
        let options = self.options();
        VtrMaster::connect(transport, options).await
    }
}
