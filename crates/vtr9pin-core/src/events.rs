//! Asynchronous engine event types.
//!
//! Events are emitted by the protocol engine through a `tokio::sync::broadcast`
//! channel whenever a dispatched response changes cached state or reports a
//! noteworthy condition. Automation controllers and edit-suite UIs subscribe
//! to these instead of polling the engine's accessors.

use crate::types::{ConnectionState, DeviceInfo, NakCauses, StatusData, TimeCode, TimeSource};

/// An event emitted by the protocol engine.
///
/// Subscribe via the engine's `subscribe()`. Events are delivered on a
/// best-effort basis through a bounded broadcast channel; slow consumers
/// may miss events under heavy load (e.g. per-frame time updates during
/// play).
///
/// Telemetry events come in a three-phase pattern: a `...Changing` event
/// with the outgoing value fires before the cache is replaced, a
/// `...Changed` event with the new value fires after, and a `...Received`
/// event fires on every decode whether or not the value changed. This lets
/// subscribers distinguish a state transition from a heartbeat.
#[derive(Debug, Clone)]
pub enum VtrEvent {
    /// The connection lifecycle state changed.
    ConnectionChanged {
        /// The new connection state.
        state: ConnectionState,
    },

    /// Link health flipped (orthogonal to the connection being open).
    ///
    /// `false` means the last exchange missed the response timing budget;
    /// `true` means a subsequent exchange completed in time again.
    LinkHealthChanged {
        /// `true` if the link is answering within the timing budget.
        healthy: bool,
    },

    /// The device answered the identity probe and was resolved.
    DeviceIdentified {
        /// Resolved identity (or the hex fallback for unknown ids).
        device: DeviceInfo,
    },

    /// The device rejected a command with a NAK.
    NakReceived {
        /// Decoded error-cause flags.
        causes: NakCauses,
    },

    /// A status snapshot was decoded (fires on every status response).
    StatusReceived {
        /// The currently cached status.
        status: StatusData,
    },

    /// The cached status is about to be replaced.
    StatusChanging {
        /// The outgoing status value.
        old: StatusData,
    },

    /// The cached status was replaced.
    StatusChanged {
        /// The new status value.
        status: StatusData,
    },

    /// A time value was decoded (fires on every time response).
    TimeReceived {
        /// Which reader or counter produced the value.
        source: TimeSource,
        /// The currently cached timecode.
        timecode: TimeCode,
    },

    /// The cached timecode is about to be replaced.
    TimeChanging {
        /// Which reader or counter produced the new value.
        source: TimeSource,
        /// The outgoing timecode value.
        old: TimeCode,
    },

    /// The cached timecode was replaced.
    TimeChanged {
        /// Which reader or counter produced the value.
        source: TimeSource,
        /// The new timecode value.
        timecode: TimeCode,
    },
}
