//! 9-pin command frame encoder/decoder.
//!
//! The 9-pin remote protocol exchanges small binary frames over a
//! half-duplex RS-422 link. This module handles the pure byte-level
//! encoding and decoding of those frames, including checksum validation
//! and partial-frame detection. It performs no I/O and holds no state
//! beyond the buffer passed in, so it is unit-testable against literal
//! byte fixtures.
//!
//! # Frame format
//!
//! ```text
//! <cat|count> <function> [<data>...] <checksum>
//! ```
//!
//! - Byte 0: command category in the high nibble, operand count in the low
//!   nibble. A low nibble of `0xF` is the long-form sentinel: the next
//!   byte is then an explicit operand count (up to 255) and the function
//!   code follows it.
//! - Function code byte.
//! - `count` operand data bytes.
//! - Checksum: the low 8 bits of the sum of all preceding bytes.
//!
//! A frame with operand count 0 is exactly 3 bytes.

use bytes::{BufMut, BytesMut};
use vtr9pin_core::Error;

/// Mask selecting the category nibble of the first frame byte.
pub const CATEGORY_MASK: u8 = 0xF0;

/// Mask selecting the operand-count nibble of the first frame byte.
pub const COUNT_MASK: u8 = 0x0F;

/// Low-nibble sentinel marking a long-form frame with an explicit count byte.
pub const LONG_FORM_SENTINEL: u8 = 0x0F;

/// Maximum operand bytes expressible in the short frame form. The count
/// nibble `0xF` is taken by the long-form sentinel, so the short form only
/// covers 0..=14.
pub const SHORT_FORM_MAX_DATA: usize = 14;

/// Maximum operand bytes expressible in the long frame form.
pub const LONG_FORM_MAX_DATA: usize = 255;

// Command categories (high nibble of the first frame byte).

/// System control commands (device type request, local disable, ...).
pub const SYSTEM_CONTROL: u8 = 0x00;

/// Return responses (ACK, NAK, device type).
pub const RETURN: u8 = 0x10;

/// Transport control commands (play, stop, jog, eject, ...).
pub const TRANSPORT_CONTROL: u8 = 0x20;

/// Preset/select control commands (in/out entry, shift, ...).
pub const PRESET_SELECT_CONTROL: u8 = 0x40;

/// Sense requests (status sense, current time sense, ...).
pub const SENSE_REQUEST: u8 = 0x60;

/// Sense returns (status data, time data variants).
pub const SENSE_RETURN: u8 = 0x70;

// Return-category function codes.

/// ACK function code — the last command was accepted.
pub const ACK: u8 = 0x01;

/// Device-type function code — carries the 2-byte device id.
pub const DEVICE_TYPE: u8 = 0x11;

/// NAK function code — carries the error-cause bitfield.
pub const NAK: u8 = 0x12;

/// A parsed 9-pin command frame.
///
/// This is the protocol-level representation of a single message, whether
/// it is a command from the master or a response from the device. The
/// checksum only exists on the wire; a decoded frame is already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command category — the high nibble of the first wire byte, stored
    /// with the low nibble zero (e.g. `0x20` for transport control).
    pub category: u8,
    /// Function code within the category.
    pub function: u8,
    /// Operand data bytes (may be empty).
    pub data: Vec<u8>,
}

impl Frame {
    /// Returns `true` if this frame is a positive acknowledgement (ACK).
    pub fn is_ack(&self) -> bool {
        self.category == RETURN && self.function == ACK
    }

    /// Returns `true` if this frame is a negative acknowledgement (NAK).
    pub fn is_nak(&self) -> bool {
        self.category == RETURN && self.function == NAK
    }

    /// Returns `true` if this frame is a device-type response.
    pub fn is_device_type(&self) -> bool {
        self.category == RETURN && self.function == DEVICE_TYPE
    }

    /// Returns `true` if this frame is a sense return (status or time data).
    pub fn is_sense_return(&self) -> bool {
        self.category == SENSE_RETURN
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}.{:02X}", self.category, self.function)?;
        if !self.data.is_empty() {
            write!(f, " {:02X?}", self.data)?;
        }
        Ok(())
    }
}

/// Compute the frame checksum: the low 8 bits of the byte sum.
fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Encode a frame into raw bytes ready for transmission.
///
/// Picks the short or long form from the operand length and appends the
/// checksum. Fails with [`Error::InvalidOperand`] if `data` exceeds the
/// long form's 255-byte limit — before any I/O happens.
///
/// # Example
///
/// ```
/// use vtr9pin_protocol::frame::{encode_frame, TRANSPORT_CONTROL};
///
/// // Transport-control stop command
/// let bytes = encode_frame(TRANSPORT_CONTROL, 0x00, &[]).unwrap();
/// assert_eq!(bytes, vec![0x20, 0x00, 0x20]);
/// ```
pub fn encode_frame(category: u8, function: u8, data: &[u8]) -> vtr9pin_core::Result<Vec<u8>> {
    if data.len() > LONG_FORM_MAX_DATA {
        return Err(Error::InvalidOperand(format!(
            "operand length {} exceeds the long-form limit of {LONG_FORM_MAX_DATA}",
            data.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(4 + data.len());
    if data.len() > SHORT_FORM_MAX_DATA {
        buf.put_u8((category & CATEGORY_MASK) | LONG_FORM_SENTINEL);
        buf.put_u8(data.len() as u8);
        buf.put_u8(function);
    } else {
        buf.put_u8((category & CATEGORY_MASK) | data.len() as u8);
        buf.put_u8(function);
    }
    buf.put_slice(data);
    let sum = checksum(&buf);
    buf.put_u8(sum);
    Ok(buf.to_vec())
}

/// Encode a [`Frame`] into raw bytes.
///
/// Convenience wrapper around [`encode_frame`] that takes a frame struct.
pub fn encode(frame: &Frame) -> vtr9pin_core::Result<Vec<u8>> {
    encode_frame(frame.category, frame.function, &frame.data)
}

/// Result of attempting to decode a frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete, checksum-valid frame was decoded. The `usize` is the
    /// number of bytes consumed from the input buffer.
    Frame(Frame, usize),

    /// The buffer does not yet contain a complete frame. More data is
    /// needed — this is a state, not an error.
    Incomplete,

    /// The buffer holds an apparently-complete frame whose checksum does
    /// not match. The caller decides how to resynchronize (typically by
    /// discarding one byte and retrying).
    Invalid,
}

/// Attempt to decode one frame from the front of a byte buffer.
///
/// Callable repeatedly as bytes trickle in; each call re-evaluates the
/// current buffer. The expected frame length is derived from the count
/// nibble (or the long-form count byte), so the caller never needs to
/// know it in advance.
///
/// # Example
///
/// ```
/// use vtr9pin_protocol::frame::{decode_frame, DecodeResult};
///
/// // ACK response
/// match decode_frame(&[0x10, 0x01, 0x11]) {
///     DecodeResult::Frame(frame, consumed) => {
///         assert!(frame.is_ack());
///         assert_eq!(consumed, 3);
///     }
///     _ => panic!("expected a frame"),
/// }
/// ```
pub fn decode_frame(buf: &[u8]) -> DecodeResult {
    if buf.is_empty() {
        return DecodeResult::Incomplete;
    }

    let category = buf[0] & CATEGORY_MASK;
    let count_nibble = buf[0] & COUNT_MASK;

    // header_len counts the bytes before the operand data.
    let (data_len, header_len) = if count_nibble == LONG_FORM_SENTINEL {
        if buf.len() < 2 {
            return DecodeResult::Incomplete;
        }
        (buf[1] as usize, 3)
    } else {
        (count_nibble as usize, 2)
    };

    let total = header_len + data_len + 1;
    if buf.len() < total {
        return DecodeResult::Incomplete;
    }

    if checksum(&buf[..total - 1]) != buf[total - 1] {
        return DecodeResult::Invalid;
    }

    let function = buf[header_len - 1];
    let data = buf[header_len..header_len + data_len].to_vec();
    DecodeResult::Frame(
        Frame {
            category,
            function,
            data,
        },
        total,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_stop_command() {
        // Operand count 0 → exactly 3 bytes, checksum = 0x20 + 0x00.
        let bytes = encode_frame(TRANSPORT_CONTROL, 0x00, &[]).unwrap();
        assert_eq!(bytes, vec![0x20, 0x00, 0x20]);
    }

    #[test]
    fn encode_with_operands() {
        // Jog forward with one speed operand.
        let bytes = encode_frame(TRANSPORT_CONTROL, 0x11, &[0x42]).unwrap();
        assert_eq!(bytes, vec![0x21, 0x11, 0x42, 0x74]);
    }

    #[test]
    fn encode_checksum_wraps() {
        let bytes = encode_frame(TRANSPORT_CONTROL, 0xFF, &[0xFF]).unwrap();
        // 0x21 + 0xFF + 0xFF = 0x21F → low 8 bits 0x1F.
        assert_eq!(bytes, vec![0x21, 0xFF, 0xFF, 0x1F]);
    }

    #[test]
    fn encode_long_form() {
        let data = [0xAB; 20];
        let bytes = encode_frame(PRESET_SELECT_CONTROL, 0x30, &data).unwrap();
        assert_eq!(bytes[0], 0x4F);
        assert_eq!(bytes[1], 20);
        assert_eq!(bytes[2], 0x30);
        assert_eq!(bytes.len(), 3 + 20 + 1);
    }

    #[test]
    fn encode_rejects_oversized_operands() {
        let data = [0u8; 256];
        let result = encode_frame(TRANSPORT_CONTROL, 0x00, &data);
        assert!(matches!(result, Err(Error::InvalidOperand(_))));
    }

    #[test]
    fn decode_ack() {
        match decode_frame(&[0x10, 0x01, 0x11]) {
            DecodeResult::Frame(frame, consumed) => {
                assert!(frame.is_ack());
                assert!(!frame.is_nak());
                assert_eq!(consumed, 3);
                assert!(frame.data.is_empty());
            }
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn decode_device_type_response() {
        match decode_frame(&[0x12, 0x11, 0x02, 0x85, 0xAA]) {
            DecodeResult::Frame(frame, consumed) => {
                assert!(frame.is_device_type());
                assert_eq!(frame.category, RETURN);
                assert_eq!(frame.data, vec![0x02, 0x85]);
                assert_eq!(consumed, 5);
            }
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn round_trip_preserves_fields() {
        let cases: &[(u8, u8, &[u8])] = &[
            (SYSTEM_CONTROL, 0x11, &[]),
            (TRANSPORT_CONTROL, 0x11, &[0x05]),
            (SENSE_REQUEST, 0x20, &[0x09]),
            (SENSE_RETURN, 0x04, &[0x12, 0x45, 0x23, 0x01]),
            (PRESET_SELECT_CONTROL, 0x00, &[1, 2, 3, 4, 5, 6, 7, 8]),
        ];
        for &(category, function, data) in cases {
            let bytes = encode_frame(category, function, data).unwrap();
            match decode_frame(&bytes) {
                DecodeResult::Frame(frame, consumed) => {
                    assert_eq!(frame.category, category);
                    assert_eq!(frame.function, function);
                    assert_eq!(frame.data, data);
                    assert_eq!(consumed, bytes.len());
                }
                other => panic!("round trip failed for {category:02X}.{function:02X}: {other:?}"),
            }
        }
    }

    #[test]
    fn round_trip_at_the_form_boundary() {
        // 14 operands is the largest short frame; 15 collides with the
        // long-form sentinel nibble and must take the long form.
        for len in [14usize, 15, 16] {
            let data: Vec<u8> = (0..len as u8).collect();
            let bytes = encode_frame(PRESET_SELECT_CONTROL, 0x30, &data).unwrap();
            if len <= SHORT_FORM_MAX_DATA {
                assert_eq!(bytes[0] & COUNT_MASK, len as u8);
                assert_eq!(bytes.len(), 2 + len + 1);
            } else {
                assert_eq!(bytes[0] & COUNT_MASK, LONG_FORM_SENTINEL);
                assert_eq!(bytes[1] as usize, len);
                assert_eq!(bytes.len(), 3 + len + 1);
            }
            match decode_frame(&bytes) {
                DecodeResult::Frame(frame, consumed) => {
                    assert_eq!(frame.data, data, "payload of {len} bytes");
                    assert_eq!(consumed, bytes.len());
                }
                other => panic!("round trip failed for {len}-byte payload: {other:?}"),
            }
        }
    }

    #[test]
    fn round_trip_long_form() {
        let data: Vec<u8> = (0..100).collect();
        let bytes = encode_frame(SENSE_RETURN, 0x05, &data).unwrap();
        match decode_frame(&bytes) {
            DecodeResult::Frame(frame, consumed) => {
                assert_eq!(frame.category, SENSE_RETURN);
                assert_eq!(frame.function, 0x05);
                assert_eq!(frame.data, data);
                assert_eq!(consumed, bytes.len());
            }
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn every_prefix_is_incomplete() {
        // Every proper prefix of a valid frame must decode as Incomplete,
        // never Invalid or Frame.
        let bytes = encode_frame(SENSE_RETURN, 0x04, &[0x12, 0x45, 0x23, 0x01]).unwrap();
        for len in 0..bytes.len() {
            assert_eq!(
                decode_frame(&bytes[..len]),
                DecodeResult::Incomplete,
                "prefix of length {len} should be incomplete"
            );
        }
    }

    #[test]
    fn long_form_prefix_is_incomplete() {
        let bytes = encode_frame(TRANSPORT_CONTROL, 0x00, &[0x55; 30]).unwrap();
        for len in 0..bytes.len() {
            assert_eq!(decode_frame(&bytes[..len]), DecodeResult::Incomplete);
        }
    }

    #[test]
    fn corrupt_function_byte_is_invalid() {
        let mut bytes = encode_frame(TRANSPORT_CONTROL, 0x01, &[]).unwrap();
        bytes[1] ^= 0x04;
        assert_eq!(decode_frame(&bytes), DecodeResult::Invalid);
    }

    #[test]
    fn any_payload_bit_flip_is_invalid() {
        // Flipping any single bit of the function or operand bytes must
        // fail the checksum. (The count nibble is excluded: changing it
        // changes the expected frame length rather than corrupting the
        // payload.)
        let bytes = encode_frame(SENSE_RETURN, 0x04, &[0x12, 0x45, 0x23, 0x01]).unwrap();
        for byte_idx in 1..bytes.len() - 1 {
            for bit in 0..8 {
                let mut corrupted = bytes.clone();
                corrupted[byte_idx] ^= 1 << bit;
                assert_eq!(
                    decode_frame(&corrupted),
                    DecodeResult::Invalid,
                    "flip of byte {byte_idx} bit {bit} should be invalid"
                );
            }
        }
    }

    #[test]
    fn corrupt_checksum_byte_is_invalid() {
        let mut bytes = encode_frame(TRANSPORT_CONTROL, 0x00, &[]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert_eq!(decode_frame(&bytes), DecodeResult::Invalid);
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let mut bytes = encode_frame(RETURN, ACK, &[]).unwrap();
        let frame_len = bytes.len();
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        match decode_frame(&bytes) {
            DecodeResult::Frame(frame, consumed) => {
                assert!(frame.is_ack());
                assert_eq!(consumed, frame_len);
            }
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn frame_display() {
        let frame = Frame {
            category: TRANSPORT_CONTROL,
            function: 0x11,
            data: vec![0x42],
        };
        assert_eq!(frame.to_string(), "20.11 [42]");

        let stop = Frame {
            category: TRANSPORT_CONTROL,
            function: 0x00,
            data: vec![],
        };
        assert_eq!(stop.to_string(), "20.00");
    }
}
