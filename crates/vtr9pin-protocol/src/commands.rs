//! Command construction and response classification.
//!
//! Builders here produce [`Frame`] values for the commands a controller
//! sends; the response side maps sense-return function codes back to the
//! telemetry they carry. Operand validation happens at build time, before
//! any bytes reach the wire.

use vtr9pin_core::types::{TimeCode, TimeSource};
use vtr9pin_core::Error;

use crate::frame::{
    Frame, LONG_FORM_MAX_DATA, PRESET_SELECT_CONTROL, SENSE_REQUEST, SYSTEM_CONTROL,
    TRANSPORT_CONTROL,
};

// System-control function codes.
const LOCAL_DISABLE: u8 = 0x0C;
const DEVICE_TYPE_REQUEST: u8 = 0x11;
const LOCAL_ENABLE: u8 = 0x1D;

// Transport-control function codes.
const STOP: u8 = 0x00;
const PLAY: u8 = 0x01;
const RECORD: u8 = 0x02;
const STANDBY_OFF: u8 = 0x04;
const STANDBY_ON: u8 = 0x05;
const EJECT: u8 = 0x0F;
const FAST_FORWARD: u8 = 0x10;
const JOG_FORWARD: u8 = 0x11;
const VAR_FORWARD: u8 = 0x12;
const SHUTTLE_FORWARD: u8 = 0x13;
const REWIND: u8 = 0x20;
const JOG_REVERSE: u8 = 0x21;
const VAR_REVERSE: u8 = 0x22;
const SHUTTLE_REVERSE: u8 = 0x23;
const PREROLL: u8 = 0x30;
const CUE_UP_WITH_DATA: u8 = 0x31;

// Preset/select function codes.
const TIMER1_PRESET: u8 = 0x00;
const TIME_CODE_PRESET: u8 = 0x04;
const IN_ENTRY: u8 = 0x10;
const OUT_ENTRY: u8 = 0x11;

// Sense-request function codes.
const CURRENT_TIME_SENSE: u8 = 0x0C;
const STATUS_SENSE: u8 = 0x20;

/// Build an arbitrary command frame, validating the operand length.
///
/// The escape hatch for device-specific commands the named builders do not
/// cover. Fails with [`Error::InvalidOperand`] before any I/O if `operands`
/// exceeds the long-form limit.
pub fn build_command(category: u8, function: u8, operands: &[u8]) -> vtr9pin_core::Result<Frame> {
    if operands.len() > LONG_FORM_MAX_DATA {
        return Err(Error::InvalidOperand(format!(
            "operand length {} exceeds the long-form limit of {LONG_FORM_MAX_DATA}",
            operands.len()
        )));
    }
    Ok(Frame {
        category,
        function,
        data: operands.to_vec(),
    })
}

fn system(function: u8) -> Frame {
    Frame {
        category: SYSTEM_CONTROL,
        function,
        data: Vec::new(),
    }
}

fn transport(function: u8) -> Frame {
    Frame {
        category: TRANSPORT_CONTROL,
        function,
        data: Vec::new(),
    }
}

fn transport_with(function: u8, data: Vec<u8>) -> Frame {
    Frame {
        category: TRANSPORT_CONTROL,
        function,
        data,
    }
}

/// Device-type request. The probe command; every compliant device answers
/// it with its 2-byte identity.
pub fn device_type_request() -> Frame {
    system(DEVICE_TYPE_REQUEST)
}

/// Lock out the device's front panel controls.
pub fn local_disable() -> Frame {
    system(LOCAL_DISABLE)
}

/// Re-enable the device's front panel controls.
pub fn local_enable() -> Frame {
    system(LOCAL_ENABLE)
}

/// Stop the transport.
pub fn stop() -> Frame {
    transport(STOP)
}

/// Play at normal speed.
pub fn play() -> Frame {
    transport(PLAY)
}

/// Start recording.
pub fn record() -> Frame {
    transport(RECORD)
}

/// Release standby (drum spins down, tape unthreads).
pub fn standby_off() -> Frame {
    transport(STANDBY_OFF)
}

/// Enter standby (drum up to speed, ready for instant motion).
pub fn standby_on() -> Frame {
    transport(STANDBY_ON)
}

/// Eject the cassette.
pub fn eject() -> Frame {
    transport(EJECT)
}

/// Fast forward at maximum speed.
pub fn fast_forward() -> Frame {
    transport(FAST_FORWARD)
}

/// Rewind at maximum speed.
pub fn rewind() -> Frame {
    transport(REWIND)
}

/// Jog forward at the given device speed value.
pub fn jog_forward(speed: u8) -> Frame {
    transport_with(JOG_FORWARD, vec![speed])
}

/// Jog backward at the given device speed value.
pub fn jog_reverse(speed: u8) -> Frame {
    transport_with(JOG_REVERSE, vec![speed])
}

/// Variable-speed play forward (capstan servo engaged).
pub fn var_forward(speed: u8) -> Frame {
    transport_with(VAR_FORWARD, vec![speed])
}

/// Variable-speed play backward.
pub fn var_reverse(speed: u8) -> Frame {
    transport_with(VAR_REVERSE, vec![speed])
}

/// Shuttle forward at the given device speed value.
pub fn shuttle_forward(speed: u8) -> Frame {
    transport_with(SHUTTLE_FORWARD, vec![speed])
}

/// Shuttle backward at the given device speed value.
pub fn shuttle_reverse(speed: u8) -> Frame {
    transport_with(SHUTTLE_REVERSE, vec![speed])
}

/// Preroll to the preset in point minus the preroll time.
pub fn preroll() -> Frame {
    transport(PREROLL)
}

/// Cue the transport up to the given timecode and park.
pub fn cue_up_with_data(target: TimeCode) -> Frame {
    transport_with(CUE_UP_WITH_DATA, target.to_bcd_bytes().to_vec())
}

fn preset(function: u8, data: Vec<u8>) -> Frame {
    Frame {
        category: PRESET_SELECT_CONTROL,
        function,
        data,
    }
}

/// Preset CTL counter timer 1 to the given value.
pub fn timer1_preset(value: TimeCode) -> Frame {
    preset(TIMER1_PRESET, value.to_bcd_bytes().to_vec())
}

/// Preset the timecode generator to the given value.
pub fn time_code_preset(value: TimeCode) -> Frame {
    preset(TIME_CODE_PRESET, value.to_bcd_bytes().to_vec())
}

/// Mark the current position as the edit in point.
pub fn in_entry() -> Frame {
    preset(IN_ENTRY, Vec::new())
}

/// Mark the current position as the edit out point.
pub fn out_entry() -> Frame {
    preset(OUT_ENTRY, Vec::new())
}

/// Selector for a current-time sense request.
///
/// The operand is a bitmask; the device answers with the first requested
/// source it can currently read (falling back to a held variant when the
/// reader has lost lock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSenseRequest {
    /// Longitudinal timecode.
    LtcTime,
    /// Vertical-interval timecode.
    VitcTime,
    /// CTL counter timer 1.
    Timer1,
    /// CTL counter timer 2.
    Timer2,
    /// LTC user bits.
    LtcUserBits,
    /// VITC user bits.
    VitcUserBits,
}

impl TimeSenseRequest {
    /// The selector bit this request sets in the sense operand.
    pub fn selector(self) -> u8 {
        match self {
            TimeSenseRequest::LtcTime => 0x01,
            TimeSenseRequest::VitcTime => 0x02,
            TimeSenseRequest::Timer1 => 0x04,
            TimeSenseRequest::Timer2 => 0x08,
            TimeSenseRequest::LtcUserBits => 0x10,
            TimeSenseRequest::VitcUserBits => 0x20,
        }
    }
}

/// Current-time sense request for one source.
pub fn current_time_sense(request: TimeSenseRequest) -> Frame {
    Frame {
        category: SENSE_REQUEST,
        function: CURRENT_TIME_SENSE,
        data: vec![request.selector()],
    }
}

/// Status sense request for a window of the status bitfield.
///
/// `start` is the first status byte wanted and `count` how many; the
/// operand packs them as `start << 4 | count`. Fails with
/// [`Error::InvalidOperand`] when the window falls outside the 10-byte
/// status block.
pub fn status_sense(start: u8, count: u8) -> vtr9pin_core::Result<Frame> {
    if start > 9 || count == 0 || count > 10 - start {
        return Err(Error::InvalidOperand(format!(
            "status window start {start} count {count} is out of range"
        )));
    }
    Ok(Frame {
        category: SENSE_REQUEST,
        function: STATUS_SENSE,
        data: vec![(start << 4) | count],
    })
}

/// Status sense request for the full 9-byte window the engine caches.
pub fn status_sense_full() -> Frame {
    Frame {
        category: SENSE_REQUEST,
        function: STATUS_SENSE,
        data: vec![0x09],
    }
}

/// Classified sense-return payload kind.
///
/// Maps the function code of a sense-return frame to the telemetry it
/// carries. Unknown function codes map to `None` and are ignored by the
/// dispatcher rather than treated as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseReturn {
    /// A time value from one of the readers or counters.
    Time(TimeSource),
    /// A status bitfield window.
    Status,
}

impl SenseReturn {
    /// Classify a sense-return function code.
    pub fn from_function(function: u8) -> Option<Self> {
        let kind = match function {
            0x00 => SenseReturn::Time(TimeSource::Timer1),
            0x01 => SenseReturn::Time(TimeSource::Timer2),
            0x04 => SenseReturn::Time(TimeSource::LtcTime),
            0x05 => SenseReturn::Time(TimeSource::LtcUserBits),
            0x06 => SenseReturn::Time(TimeSource::VitcTime),
            0x07 => SenseReturn::Time(TimeSource::VitcUserBits),
            0x08 => SenseReturn::Time(TimeSource::GeneratorTime),
            0x09 => SenseReturn::Time(TimeSource::GeneratorUserBits),
            0x14 => SenseReturn::Time(TimeSource::CorrectedLtcTime),
            0x15 => SenseReturn::Time(TimeSource::HoldLtcUserBits),
            0x16 => SenseReturn::Time(TimeSource::HoldVitcTime),
            0x17 => SenseReturn::Time(TimeSource::HoldVitcUserBits),
            0x20 => SenseReturn::Status,
            _ => return None,
        };
        Some(kind)
    }
}

/// Extract the 2-byte device id from a device-type response payload.
pub fn parse_device_id(data: &[u8]) -> vtr9pin_core::Result<u16> {
    if data.len() < 2 {
        return Err(Error::Protocol(format!(
            "device-type response needs 2 operand bytes, got {}",
            data.len()
        )));
    }
    Ok(u16::from_be_bytes([data[0], data[1]]))
}
