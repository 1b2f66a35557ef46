//! Value types shared across the vtr9pin crates.
//!
//! These are the decoded, value-comparable representations of device
//! telemetry: [`TimeCode`] and [`StatusData`] snapshots, the resolved
//! [`DeviceInfo`] identity, NAK cause flags, and the connection state
//! machine. All of them are immutable once constructed — the engine
//! replaces its cached copies wholesale, never mutates them in place.

use crate::error::{Error, Result};

/// Connection lifecycle of the protocol engine.
///
/// The `Connected`/`Disconnected` distinction is about the channel and the
/// engine tasks; it is orthogonal to link health (a device that stops
/// answering within the timing budget is still "connected" but unhealthy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No channel is open and no engine tasks are running.
    Disconnected,
    /// The channel is open and the engine is probing for the device identity.
    Probing,
    /// The probe succeeded; the engine is serving commands and idle polls.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Probing => write!(f, "probing"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

// ---------------------------------------------------------------------------
// Timecode
// ---------------------------------------------------------------------------

/// A decoded SMPTE timecode value.
///
/// On the wire the four fields travel as binary-coded decimal in the order
/// frames, seconds, minutes, hours. The frames byte additionally carries the
/// drop-frame flag (bit 6) and the color-frame flag (bit 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeCode {
    /// Hours, 0..=23.
    pub hour: u8,
    /// Minutes, 0..=59.
    pub minute: u8,
    /// Seconds, 0..=59.
    pub second: u8,
    /// Frames, 0..=29 (NTSC) or 0..=24 (PAL).
    pub frame: u8,
    /// Drop-frame counting flag (NTSC 29.97 material).
    pub drop_frame: bool,
    /// Color-frame flag.
    pub color_frame: bool,
}

/// Drop-frame flag bit in the frames byte.
const DROP_FRAME_BIT: u8 = 0x40;

/// Color-frame flag bit in the frames byte.
const COLOR_FRAME_BIT: u8 = 0x80;

/// Decode one BCD byte, validating that both nibbles are decimal digits.
fn bcd_to_u8(b: u8) -> Result<u8> {
    let tens = b >> 4;
    let units = b & 0x0F;
    if tens > 9 || units > 9 {
        return Err(Error::Protocol(format!("invalid BCD byte 0x{b:02X}")));
    }
    Ok(tens * 10 + units)
}

/// Encode a value 0..=99 as one BCD byte.
fn u8_to_bcd(v: u8) -> u8 {
    ((v / 10) << 4) | (v % 10)
}

impl TimeCode {
    /// Decode a timecode from the 4-byte wire layout.
    ///
    /// Layout: `[frames, seconds, minutes, hours]`, each BCD. The frames
    /// byte masks out the drop-frame and color-frame flag bits before the
    /// BCD digits are read. Fails with [`Error::Protocol`] on a short
    /// buffer or a non-decimal digit.
    pub fn from_bcd_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::Protocol(format!(
                "timecode needs 4 operand bytes, got {}",
                data.len()
            )));
        }
        Ok(TimeCode {
            frame: bcd_to_u8(data[0] & !(DROP_FRAME_BIT | COLOR_FRAME_BIT))?,
            second: bcd_to_u8(data[1] & 0x7F)?,
            minute: bcd_to_u8(data[2] & 0x7F)?,
            hour: bcd_to_u8(data[3] & 0x3F)?,
            drop_frame: data[0] & DROP_FRAME_BIT != 0,
            color_frame: data[0] & COLOR_FRAME_BIT != 0,
        })
    }

    /// Encode this timecode into the 4-byte wire layout.
    pub fn to_bcd_bytes(&self) -> [u8; 4] {
        let mut frames = u8_to_bcd(self.frame);
        if self.drop_frame {
            frames |= DROP_FRAME_BIT;
        }
        if self.color_frame {
            frames |= COLOR_FRAME_BIT;
        }
        [
            frames,
            u8_to_bcd(self.second),
            u8_to_bcd(self.minute),
            u8_to_bcd(self.hour),
        ]
    }
}

impl std::fmt::Display for TimeCode {
    /// Formats as `HH:MM:SS:FF`, with the conventional `;` frame separator
    /// for drop-frame material.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sep = if self.drop_frame { ';' } else { ':' };
        write!(
            f,
            "{:02}:{:02}:{:02}{}{:02}",
            self.hour, self.minute, self.second, sep, self.frame
        )
    }
}

// ---------------------------------------------------------------------------
// Status data
// ---------------------------------------------------------------------------

/// Maximum number of status bytes a device reports.
pub const STATUS_DATA_LEN: usize = 9;

/// A decoded device status snapshot.
///
/// Holds the raw status bitfield bytes as reported by the device. The
/// snapshot is compared by value to detect change; individual mode flags
/// are exposed through predicate accessors. Bytes the device did not
/// report (a partial status sense) read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusData {
    raw: [u8; STATUS_DATA_LEN],
    len: usize,
}

impl StatusData {
    /// Build a snapshot from the operand bytes of a status sense response.
    ///
    /// Accepts 1..=9 bytes; the device returns fewer when the sense request
    /// asked for a partial window.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() || data.len() > STATUS_DATA_LEN {
            return Err(Error::Protocol(format!(
                "status data needs 1..={STATUS_DATA_LEN} operand bytes, got {}",
                data.len()
            )));
        }
        let mut raw = [0u8; STATUS_DATA_LEN];
        raw[..data.len()].copy_from_slice(data);
        Ok(StatusData {
            raw,
            len: data.len(),
        })
    }

    /// Raw status bytes as reported (unreported bytes are zero).
    pub fn raw(&self) -> &[u8] {
        &self.raw[..self.len]
    }

    // Byte 0 — cassette / control flags.

    /// The device is in local (front panel) control; remote commands other
    /// than sense requests will be NAKed.
    pub fn local(&self) -> bool {
        self.raw[0] & 0x01 != 0
    }

    /// No cassette (or disk pack) is loaded.
    pub fn cassette_out(&self) -> bool {
        self.raw[0] & 0x20 != 0
    }

    /// The servo reference signal is missing.
    pub fn servo_ref_missing(&self) -> bool {
        self.raw[0] & 0x10 != 0
    }

    // Byte 1 — transport motion flags.

    /// Tape is playing.
    pub fn play(&self) -> bool {
        self.raw[1] & 0x01 != 0
    }

    /// The device is recording.
    pub fn record(&self) -> bool {
        self.raw[1] & 0x02 != 0
    }

    /// Tape is fast-forwarding.
    pub fn fast_forward(&self) -> bool {
        self.raw[1] & 0x04 != 0
    }

    /// Tape is rewinding.
    pub fn rewind(&self) -> bool {
        self.raw[1] & 0x08 != 0
    }

    /// The transport is ejecting.
    pub fn eject(&self) -> bool {
        self.raw[1] & 0x10 != 0
    }

    /// The transport is stopped.
    pub fn stop(&self) -> bool {
        self.raw[1] & 0x20 != 0
    }

    /// The device is in standby.
    pub fn standby(&self) -> bool {
        self.raw[1] & 0x80 != 0
    }

    // Byte 2 — servo / shuttle flags.

    /// A cue-up has completed and the transport is parked on the target.
    pub fn cue_up(&self) -> bool {
        self.raw[2] & 0x01 != 0
    }

    /// The transport is in still mode.
    pub fn still(&self) -> bool {
        self.raw[2] & 0x02 != 0
    }

    /// Tape direction is reverse.
    pub fn direction_reverse(&self) -> bool {
        self.raw[2] & 0x04 != 0
    }

    /// The transport is in variable-speed mode.
    pub fn var(&self) -> bool {
        self.raw[2] & 0x08 != 0
    }

    /// The transport is in jog mode.
    pub fn jog(&self) -> bool {
        self.raw[2] & 0x10 != 0
    }

    /// The transport is in shuttle mode.
    pub fn shuttle(&self) -> bool {
        self.raw[2] & 0x20 != 0
    }

    /// The servo is locked.
    pub fn servo_lock(&self) -> bool {
        self.raw[2] & 0x80 != 0
    }

    // Byte 3 — edit preset flags.

    /// An in point has been set.
    pub fn in_set(&self) -> bool {
        self.raw[3] & 0x02 != 0
    }

    /// An out point has been set.
    pub fn out_set(&self) -> bool {
        self.raw[3] & 0x04 != 0
    }

    /// The device is in auto mode.
    pub fn auto_mode(&self) -> bool {
        self.raw[3] & 0x80 != 0
    }
}

impl std::fmt::Display for StatusData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let motion = if self.record() {
            "record"
        } else if self.play() {
            "play"
        } else if self.fast_forward() {
            "ff"
        } else if self.rewind() {
            "rew"
        } else if self.jog() {
            "jog"
        } else if self.shuttle() {
            "shuttle"
        } else if self.still() {
            "still"
        } else if self.stop() {
            "stop"
        } else {
            "idle"
        };
        write!(f, "{motion}")?;
        if self.cassette_out() {
            write!(f, ", cassette out")?;
        }
        if self.local() {
            write!(f, ", local")?;
        }
        if self.standby() {
            write!(f, ", standby")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Device identity
// ---------------------------------------------------------------------------

/// Resolved identity of the connected device.
///
/// Populated from the device-type response during the probe. Before
/// identification (and for unknown ids) the manufacturer fields default to
/// `"Generic"`; an unknown id puts its raw hex representation in `model`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Full manufacturer name (e.g. "Sony").
    pub manufacturer: String,
    /// Short manufacturer tag (e.g. "SONY").
    pub manufacturer_short: String,
    /// Model name (e.g. "BVW-75"), or the raw hex id for unknown devices.
    pub model: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        DeviceInfo {
            manufacturer: "Generic".into(),
            manufacturer_short: "Generic".into(),
            model: String::new(),
        }
    }
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.model.is_empty() {
            write!(f, "{}", self.manufacturer)
        } else {
            write!(f, "{} {}", self.manufacturer, self.model)
        }
    }
}

// ---------------------------------------------------------------------------
// NAK causes
// ---------------------------------------------------------------------------

/// The error-cause bitfield carried by a NAK response.
///
/// Each cause is an independently settable flag; a single NAK can report
/// several at once. The engine surfaces the full set and never applies a
/// per-cause corrective delay itself — that policy belongs to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NakCauses(u8);

impl NakCauses {
    /// Checksum mismatch on the received command.
    pub const CHECKSUM_ERROR: u8 = 0x01;
    /// Framing error on the serial line.
    pub const FRAME_ERROR: u8 = 0x02;
    /// Receive buffer overrun.
    pub const OVERRUN_ERROR: u8 = 0x04;
    /// Parity error on the serial line.
    pub const PARITY_ERROR: u8 = 0x08;
    /// The device timed out waiting for the rest of the command.
    pub const TIMEOUT: u8 = 0x10;
    /// The command is undefined or not supported in the current state.
    pub const UNDEFINED_ERROR: u8 = 0x20;

    /// Build a cause set from the NAK operand byte.
    pub fn from_byte(b: u8) -> Self {
        NakCauses(b)
    }

    /// The raw cause bitfield.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// `true` if no cause flag is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Checksum-error flag.
    pub fn checksum_error(&self) -> bool {
        self.0 & Self::CHECKSUM_ERROR != 0
    }

    /// Frame-error flag.
    pub fn frame_error(&self) -> bool {
        self.0 & Self::FRAME_ERROR != 0
    }

    /// Overrun-error flag.
    pub fn overrun_error(&self) -> bool {
        self.0 & Self::OVERRUN_ERROR != 0
    }

    /// Parity-error flag.
    pub fn parity_error(&self) -> bool {
        self.0 & Self::PARITY_ERROR != 0
    }

    /// Device-side timeout flag.
    pub fn timeout(&self) -> bool {
        self.0 & Self::TIMEOUT != 0
    }

    /// Undefined-command flag.
    pub fn undefined_error(&self) -> bool {
        self.0 & Self::UNDEFINED_ERROR != 0
    }
}

impl std::fmt::Display for NakCauses {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "no cause flags");
        }
        let names = [
            (Self::CHECKSUM_ERROR, "checksum error"),
            (Self::FRAME_ERROR, "frame error"),
            (Self::OVERRUN_ERROR, "overrun error"),
            (Self::PARITY_ERROR, "parity error"),
            (Self::TIMEOUT, "timeout"),
            (Self::UNDEFINED_ERROR, "undefined error"),
        ];
        let mut first = true;
        for (bit, name) in names {
            if self.0 & bit != 0 {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Time sources
// ---------------------------------------------------------------------------

/// The time source a sense-return time frame was read from.
///
/// The device reports which counter or timecode reader produced a time
/// value; held variants are the last valid reading before the reader lost
/// lock (e.g. VITC during fast shuttle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// CTL counter timer 1.
    Timer1,
    /// CTL counter timer 2.
    Timer2,
    /// Longitudinal timecode track.
    LtcTime,
    /// User bits from the LTC track.
    LtcUserBits,
    /// Vertical-interval timecode.
    VitcTime,
    /// User bits from VITC.
    VitcUserBits,
    /// Internal timecode generator.
    GeneratorTime,
    /// User bits from the internal generator.
    GeneratorUserBits,
    /// LTC corrected against the CTL count.
    CorrectedLtcTime,
    /// Held LTC user bits.
    HoldLtcUserBits,
    /// Held VITC time.
    HoldVitcTime,
    /// Held VITC user bits.
    HoldVitcUserBits,
}

impl std::fmt::Display for TimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TimeSource::Timer1 => "timer 1",
            TimeSource::Timer2 => "timer 2",
            TimeSource::LtcTime => "LTC",
            TimeSource::LtcUserBits => "LTC user bits",
            TimeSource::VitcTime => "VITC",
            TimeSource::VitcUserBits => "VITC user bits",
            TimeSource::GeneratorTime => "TC generator",
            TimeSource::GeneratorUserBits => "TC generator user bits",
            TimeSource::CorrectedLtcTime => "corrected LTC",
            TimeSource::HoldLtcUserBits => "held LTC user bits",
            TimeSource::HoldVitcTime => "held VITC",
            TimeSource::HoldVitcUserBits => "held VITC user bits",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timecode_decodes_bcd() {
        // 01:23:45:12
        let tc = TimeCode::from_bcd_bytes(&[0x12, 0x45, 0x23, 0x01]).unwrap();
        assert_eq!(tc.hour, 1);
        assert_eq!(tc.minute, 23);
        assert_eq!(tc.second, 45);
        assert_eq!(tc.frame, 12);
        assert!(!tc.drop_frame);
        assert!(!tc.color_frame);
    }

    #[test]
    fn timecode_decodes_flag_bits() {
        let tc = TimeCode::from_bcd_bytes(&[0x40 | 0x29, 0x59, 0x59, 0x23]).unwrap();
        assert!(tc.drop_frame);
        assert!(!tc.color_frame);
        assert_eq!(tc.frame, 29);

        let tc = TimeCode::from_bcd_bytes(&[0x80 | 0x05, 0x00, 0x00, 0x00]).unwrap();
        assert!(tc.color_frame);
        assert_eq!(tc.frame, 5);
    }

    #[test]
    fn timecode_round_trips() {
        let tc = TimeCode {
            hour: 23,
            minute: 59,
            second: 58,
            frame: 24,
            drop_frame: true,
            color_frame: false,
        };
        let decoded = TimeCode::from_bcd_bytes(&tc.to_bcd_bytes()).unwrap();
        assert_eq!(decoded, tc);
    }

    #[test]
    fn timecode_rejects_invalid_bcd() {
        // 0x3A has a non-decimal low nibble.
        let result = TimeCode::from_bcd_bytes(&[0x3A, 0x00, 0x00, 0x00]);
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn timecode_rejects_short_buffer() {
        let result = TimeCode::from_bcd_bytes(&[0x00, 0x00, 0x00]);
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn timecode_display() {
        let tc = TimeCode {
            hour: 1,
            minute: 2,
            second: 3,
            frame: 4,
            drop_frame: false,
            color_frame: false,
        };
        assert_eq!(tc.to_string(), "01:02:03:04");

        let df = TimeCode {
            drop_frame: true,
            ..tc
        };
        assert_eq!(df.to_string(), "01:02:03;04");
    }

    #[test]
    fn status_data_flags() {
        // byte0: cassette out; byte1: stop; byte2: servo lock + still.
        let status = StatusData::from_bytes(&[0x20, 0x20, 0x82, 0x00]).unwrap();
        assert!(status.cassette_out());
        assert!(status.stop());
        assert!(status.servo_lock());
        assert!(status.still());
        assert!(!status.play());
        assert!(!status.local());
    }

    #[test]
    fn status_data_value_equality() {
        let a = StatusData::from_bytes(&[0x00, 0x01, 0x80, 0x00]).unwrap();
        let b = StatusData::from_bytes(&[0x00, 0x01, 0x80, 0x00]).unwrap();
        let c = StatusData::from_bytes(&[0x00, 0x20, 0x80, 0x00]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn status_data_partial_window_reads_zero() {
        let status = StatusData::from_bytes(&[0x01]).unwrap();
        assert!(status.local());
        assert!(!status.play());
        assert_eq!(status.raw(), &[0x01]);
    }

    #[test]
    fn status_data_rejects_bad_lengths() {
        assert!(StatusData::from_bytes(&[]).is_err());
        assert!(StatusData::from_bytes(&[0u8; 10]).is_err());
    }

    #[test]
    fn status_data_display() {
        let playing = StatusData::from_bytes(&[0x00, 0x01, 0x00, 0x00]).unwrap();
        assert_eq!(playing.to_string(), "play");

        let stopped_local = StatusData::from_bytes(&[0x01, 0x20, 0x00, 0x00]).unwrap();
        assert_eq!(stopped_local.to_string(), "stop, local");
    }

    #[test]
    fn device_info_default_is_generic() {
        let info = DeviceInfo::default();
        assert_eq!(info.manufacturer, "Generic");
        assert_eq!(info.manufacturer_short, "Generic");
        assert_eq!(info.model, "");
        assert_eq!(info.to_string(), "Generic");
    }

    #[test]
    fn device_info_display_with_model() {
        let info = DeviceInfo {
            manufacturer: "Sony".into(),
            manufacturer_short: "SONY".into(),
            model: "BVW-75".into(),
        };
        assert_eq!(info.to_string(), "Sony BVW-75");
    }

    #[test]
    fn nak_causes_single_flag() {
        let causes = NakCauses::from_byte(0x01);
        assert!(causes.checksum_error());
        assert!(!causes.frame_error());
        assert!(!causes.overrun_error());
        assert!(!causes.parity_error());
        assert!(!causes.timeout());
        assert!(!causes.undefined_error());
        assert_eq!(causes.to_string(), "checksum error");
    }

    #[test]
    fn nak_causes_multiple_flags() {
        let causes = NakCauses::from_byte(NakCauses::PARITY_ERROR | NakCauses::TIMEOUT);
        assert!(causes.parity_error());
        assert!(causes.timeout());
        assert_eq!(causes.to_string(), "parity error, timeout");
    }

    #[test]
    fn nak_causes_empty() {
        let causes = NakCauses::from_byte(0);
        assert!(causes.is_empty());
        assert_eq!(causes.to_string(), "no cause flags");
    }

    #[test]
    fn connection_state_display() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionState::Probing.to_string(), "probing");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }

    #[test]
    fn time_source_display() {
        assert_eq!(TimeSource::LtcTime.to_string(), "LTC");
        assert_eq!(TimeSource::HoldVitcTime.to_string(), "held VITC");
    }
}
