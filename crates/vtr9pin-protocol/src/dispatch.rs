//! Response dispatch and shared engine state.
//!
//! Every decoded response frame passes through [`EngineShared::process_response`]
//! before the exchange resolves, regardless of whether it came from a host
//! command or an idle poll. The dispatcher updates the telemetry caches and
//! emits events in the three-phase pattern: `Changing` with the outgoing
//! value, then the cache swap, then `Changed` with the new value, then
//! `Received` on every decode.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, trace};

use vtr9pin_core::events::VtrEvent;
use vtr9pin_core::types::{ConnectionState, DeviceInfo, NakCauses, StatusData, TimeCode};
use vtr9pin_core::{Error, Result};

use crate::commands::{self, SenseReturn};
use crate::device;
use crate::frame::Frame;

/// Cached telemetry, replaced wholesale on each change.
#[derive(Debug, Default)]
pub(crate) struct Telemetry {
    pub status: StatusData,
    pub timecode: TimeCode,
    pub device: DeviceInfo,
}

/// State shared between the engine surface, the IO task, and the idle poller.
pub(crate) struct EngineShared {
    telemetry: Mutex<Telemetry>,
    state: Mutex<ConnectionState>,
    link_healthy: AtomicBool,
    idle_armed: AtomicBool,
    pending_requests: AtomicUsize,
    event_tx: broadcast::Sender<VtrEvent>,
}

impl EngineShared {
    pub fn new(event_tx: broadcast::Sender<VtrEvent>) -> Self {
        EngineShared {
            telemetry: Mutex::new(Telemetry::default()),
            state: Mutex::new(ConnectionState::Disconnected),
            link_healthy: AtomicBool::new(true),
            idle_armed: AtomicBool::new(false),
            pending_requests: AtomicUsize::new(0),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VtrEvent> {
        self.event_tx.subscribe()
    }

    /// Broadcast an event; nobody listening is not an error.
    pub fn emit(&self, event: VtrEvent) {
        let _ = self.event_tx.send(event);
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Move the connection state machine, emitting only on actual change.
    pub async fn set_state(&self, new: ConnectionState) {
        let mut state = self.state.lock().await;
        if *state != new {
            debug!(from = %*state, to = %new, "connection state change");
            *state = new;
            drop(state);
            self.emit(VtrEvent::ConnectionChanged { state: new });
        }
    }

    pub fn link_healthy(&self) -> bool {
        self.link_healthy.load(Ordering::Acquire)
    }

    /// Record the outcome of the last exchange against the timing budget.
    pub fn set_link_health(&self, healthy: bool) {
        let was = self.link_healthy.swap(healthy, Ordering::AcqRel);
        if was != healthy {
            debug!(healthy, "link health change");
            self.emit(VtrEvent::LinkHealthChanged { healthy });
        }
    }

    pub fn idle_armed(&self) -> bool {
        self.idle_armed.load(Ordering::Acquire)
    }

    /// Arm the idle poll timer; called after the last pending exchange
    /// completes, whether it succeeded or timed out.
    pub fn arm_idle(&self) {
        self.idle_armed.store(true, Ordering::Release);
    }

    /// Register a request entering the pump and disarm the idle poll timer.
    ///
    /// The timer stays disarmed until every registered request has resolved,
    /// so a poll can never fire with a host exchange queued behind the one
    /// in flight.
    pub fn begin_request(&self) {
        self.pending_requests.fetch_add(1, Ordering::AcqRel);
        self.idle_armed.store(false, Ordering::Release);
    }

    /// Mark one registered request resolved. Returns `true` when it was the
    /// last one pending, i.e. the idle timer may be re-armed.
    pub fn end_request(&self) -> bool {
        self.pending_requests.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub async fn status(&self) -> StatusData {
        self.telemetry.lock().await.status
    }

    pub async fn timecode(&self) -> TimeCode {
        self.telemetry.lock().await.timecode
    }

    pub async fn device_info(&self) -> DeviceInfo {
        self.telemetry.lock().await.device.clone()
    }

    /// Dispatch a decoded response frame.
    ///
    /// Updates caches, emits events, and decides the exchange outcome: an
    /// ACK or any data-bearing response resolves `Ok`, a NAK resolves
    /// `Err(Nak)` after its causes are broadcast.
    pub async fn process_response(&self, frame: &Frame) -> Result<()> {
        if frame.is_ack() {
            trace!("ack received");
            return Ok(());
        }

        if frame.is_nak() {
            let causes = NakCauses::from_byte(frame.data.first().copied().unwrap_or(0));
            debug!(%causes, "nak received");
            self.emit(VtrEvent::NakReceived { causes });
            return Err(Error::Nak(causes));
        }

        if frame.is_device_type() {
            let id = commands::parse_device_id(&frame.data)?;
            let device = device::resolve(id);
            debug!(id = format!("{id:04X}"), device = %device, "device identified");
            self.telemetry.lock().await.device = device.clone();
            self.emit(VtrEvent::DeviceIdentified { device });
            return Ok(());
        }

        if frame.is_sense_return() {
            match SenseReturn::from_function(frame.function) {
                Some(SenseReturn::Status) => self.process_status(frame).await?,
                Some(SenseReturn::Time(source)) => self.process_time(frame, source).await?,
                None => {
                    debug!(frame = %frame, "ignoring sense return with unknown function");
                }
            }
            return Ok(());
        }

        debug!(frame = %frame, "ignoring response with unknown category");
        Ok(())
    }

    async fn process_status(&self, frame: &Frame) -> Result<()> {
        let status = StatusData::from_bytes(&frame.data)?;
        let old = self.status().await;
        if status != old {
            self.emit(VtrEvent::StatusChanging { old });
            self.telemetry.lock().await.status = status;
            self.emit(VtrEvent::StatusChanged { status });
        }
        self.emit(VtrEvent::StatusReceived { status });
        Ok(())
    }

    async fn process_time(&self, frame: &Frame, source: vtr9pin_core::types::TimeSource) -> Result<()> {
        let timecode = TimeCode::from_bcd_bytes(&frame.data)?;
        let old = self.timecode().await;
        if timecode != old {
            self.emit(VtrEvent::TimeChanging { source, old });
            self.telemetry.lock().await.timecode = timecode;
            self.emit(VtrEvent::TimeChanged { source, timecode });
        }
        self.emit(VtrEvent::TimeReceived { source, timecode });
        Ok(())
    }
}
