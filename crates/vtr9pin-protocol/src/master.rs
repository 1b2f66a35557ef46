//! The protocol engine surface.
//!
//! [`VtrMaster`] is what hosts hold: it owns the exchange pump and the idle
//! poller, exposes command submission and cached telemetry, and broadcasts
//! [`VtrEvent`]s. Construction goes through
//! [`MasterBuilder`](crate::builder::MasterBuilder), which runs the identity
//! probe before handing the engine over.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vtr9pin_core::events::VtrEvent;
use vtr9pin_core::transport::Transport;
use vtr9pin_core::types::{ConnectionState, DeviceInfo, StatusData, TimeCode};
use vtr9pin_core::{Error, Result};

use crate::commands::{self, TimeSenseRequest};
use crate::dispatch::EngineShared;
use crate::exchange::{spawn_io_task, IoConfig, IoHandle, MasterIo};
use crate::frame::{self, Frame};

/// Capacity of the event broadcast channel. Slow subscribers start missing
/// events past this backlog.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Engine timing and polling options, assembled by the builder.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MasterOptions {
    pub response_budget: Duration,
    pub jitter_margin: Duration,
    pub command_timeout: Duration,
    pub idle_poll_period: Duration,
    pub idle_poll: bool,
}

/// An active 9-pin master controlling one device.
///
/// All command submission is serialized through the single exchange pump;
/// `VtrMaster` itself is cheap to share behind an `Arc` if several host
/// components need it.
pub struct VtrMaster {
    io: MasterIo,
    idle_cancel: CancellationToken,
    idle_task: Option<JoinHandle<()>>,
    shared: Arc<EngineShared>,
    command_timeout: Duration,
}

impl VtrMaster {
    /// Bring the engine up over an open transport.
    ///
    /// Spawns the exchange pump, probes the device identity, and starts the
    /// idle poller. If the probe fails the pump is torn down and the error
    /// is returned; the transport is dropped with it.
    pub(crate) async fn connect(
        transport: Box<dyn Transport>,
        options: MasterOptions,
    ) -> Result<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(EngineShared::new(event_tx));

        let io = spawn_io_task(
            transport,
            IoConfig {
                response_budget: options.response_budget,
                jitter_margin: options.jitter_margin,
            },
            shared.clone(),
        );

        shared.set_state(ConnectionState::Probing).await;
        if let Err(e) = probe_identity(&io.handle, options.command_timeout).await {
            warn!(error = %e, "identity probe failed");
            shared.set_state(ConnectionState::Disconnected).await;
            if let Ok(mut transport) = io.shutdown().await {
                let _ = transport.close().await;
            }
            return Err(e);
        }
        shared.set_state(ConnectionState::Connected).await;
        info!(device = %shared.device_info().await, "device connected");

        let idle_cancel = CancellationToken::new();
        let idle_task = if options.idle_poll {
            Some(spawn_idle_poller(
                io.handle.clone(),
                shared.clone(),
                idle_cancel.clone(),
                options.idle_poll_period,
                options.command_timeout,
            ))
        } else {
            None
        };

        Ok(VtrMaster {
            io,
            idle_cancel,
            idle_task,
            shared,
            command_timeout: options.command_timeout,
        })
    }

    /// Send a command and await the device's response.
    ///
    /// Resolves with the decoded response frame on ACK or a data response,
    /// [`Error::Nak`] when the device rejects the command, and
    /// [`Error::Timeout`] when the response misses the timing budget.
    pub async fn send(&self, frame: &Frame) -> Result<Frame> {
        self.send_with_timeout(frame, self.command_timeout).await
    }

    /// Send a command with an explicit round-trip timeout.
    pub async fn send_with_timeout(&self, frame: &Frame, timeout: Duration) -> Result<Frame> {
        let bytes = frame::encode(frame)?;
        self.io.handle.exchange(bytes, timeout).await
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<VtrEvent> {
        self.shared.subscribe()
    }

    /// The last cached status snapshot.
    pub async fn status(&self) -> StatusData {
        self.shared.status().await
    }

    /// The last cached timecode.
    pub async fn timecode(&self) -> TimeCode {
        self.shared.timecode().await
    }

    /// The resolved identity of the connected device.
    pub async fn device_info(&self) -> DeviceInfo {
        self.shared.device_info().await
    }

    /// Current connection lifecycle state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.shared.connection_state().await
    }

    /// Whether the last exchange completed within the timing budget.
    pub fn link_healthy(&self) -> bool {
        self.shared.link_healthy()
    }

    /// Shut the engine down and take the transport back.
    ///
    /// The idle poller stops first, an in-flight exchange completes, and
    /// the transport is returned still open so the caller can reuse or
    /// close it.
    pub async fn close(self) -> Result<Box<dyn Transport>> {
        debug!("closing master");
        self.idle_cancel.cancel();
        if let Some(task) = self.idle_task {
            let _ = task.await;
        }
        let result = self.io.shutdown().await;
        self.shared.set_state(ConnectionState::Disconnected).await;
        result
    }
}

/// Run the identity probe: one device-type exchange that must resolve with
/// a device-type response.
async fn probe_identity(handle: &IoHandle, timeout: Duration) -> Result<()> {
    let bytes = frame::encode(&commands::device_type_request())?;
    let response = handle.exchange(bytes, timeout).await?;
    if !response.is_device_type() {
        return Err(Error::Protocol(format!(
            "identity probe answered with {response} instead of a device-type response"
        )));
    }
    Ok(())
}

/// Spawn the idle poller.
///
/// While the timer is armed (no host exchange pending), each tick sends one
/// sense request, alternating between the full status window and the LTC
/// current time. Responses dispatch through the shared caches like any
/// other; failures are logged and polling continues.
fn spawn_idle_poller(
    handle: IoHandle,
    shared: Arc<EngineShared>,
    cancel: CancellationToken,
    period: Duration,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(period_ms = period.as_millis(), "idle poller started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut poll_status = true;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("idle poller cancelled");
                    break;
                }

                _ = interval.tick() => {
                    if !shared.idle_armed() {
                        continue;
                    }
                    let request = if poll_status {
                        commands::status_sense_full()
                    } else {
                        commands::current_time_sense(TimeSenseRequest::LtcTime)
                    };
                    poll_status = !poll_status;

                    let bytes = match frame::encode(&request) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            warn!(error = %e, "failed to encode idle poll request");
                            continue;
                        }
                    };
                    match handle.exchange(bytes, timeout).await {
                        Ok(_) => {}
                        Err(Error::Timeout) => debug!("idle poll timed out"),
                        Err(Error::Nak(causes)) => debug!(%causes, "idle poll rejected"),
                        Err(Error::NotConnected) | Err(Error::Cancelled) => {
                            debug!("idle poller stopping, engine is gone");
                            break;
                        }
                        Err(e) => debug!(error = %e, "idle poll failed"),
                    }
                }
            }
        }
    })
}
