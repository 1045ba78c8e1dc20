//! Type-safe HID report builders and feature report parsers
//!
//! Outbound reports (LEDs, jog LEDs, jog mode) and the authentication frames
//! are built here; protocol quirks such as the jog mode trailer byte live in
//! one place.

use std::fmt;

use crate::protocol::{self, auth_phase, output, AUTH_REPORT_ID, AUTH_REPORT_SIZE};
use crate::types::{JogLeds, JogMode, Leds};

// =============================================================================
// Core Traits
// =============================================================================

/// A report that can be serialized to HID bytes
pub trait HidCommand: Sized {
    /// Report ID written in byte 0
    const REPORT_ID: u8;

    /// Total buffer length including the report ID
    const LEN: usize;

    /// Serialize the payload (everything after the report ID)
    fn to_data(&self) -> Vec<u8>;

    /// Build the complete fixed-size buffer
    fn build(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        buf[0] = Self::REPORT_ID;
        let data = self.to_data();
        let len = data.len().min(Self::LEN - 1);
        buf[1..=len].copy_from_slice(&data[..len]);
        buf
    }
}

/// An authentication frame read back from the device with GET_FEATURE
pub trait HidResponse: Sized {
    /// Phase code the device must answer with
    const PHASE: u8;

    /// Parse from the 8-byte payload (bytes 2-9)
    fn from_payload(payload: &[u8; 8]) -> Self;

    /// Parse with validation of report ID, phase and length
    fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < AUTH_REPORT_SIZE {
            return Err(ParseError::TooShort {
                expected: AUTH_REPORT_SIZE,
                got: data.len(),
            });
        }
        if data[0] != AUTH_REPORT_ID {
            return Err(ParseError::UnknownReport(data[0]));
        }
        if data[1] != Self::PHASE {
            return Err(ParseError::PhaseMismatch {
                expected: Self::PHASE,
                got: data[1],
            });
        }
        let mut payload = [0u8; 8];
        payload.copy_from_slice(&data[2..AUTH_REPORT_SIZE]);
        Ok(Self::from_payload(&payload))
    }
}

/// Parse error for reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Buffer shorter than the report format requires
    TooShort { expected: usize, got: usize },
    /// Report ID not handled by this protocol
    UnknownReport(u8),
    /// Auth frame answered with the wrong phase code
    PhaseMismatch { expected: u8, got: u8 },
    InvalidValue { field: &'static str, value: u8 },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { expected, got } => {
                write!(
                    f,
                    "Report too short: expected {} bytes, got {}",
                    expected, got
                )
            }
            Self::UnknownReport(id) => write!(f, "Unrecognized report ID 0x{:02X}", id),
            Self::PhaseMismatch { expected, got } => {
                write!(
                    f,
                    "Phase mismatch: expected 0x{:02X} ({}), got 0x{:02X}",
                    expected,
                    auth_phase::name(*expected),
                    got
                )
            }
            Self::InvalidValue { field, value } => {
                write!(f, "Invalid value for {}: 0x{:02X}", field, value)
            }
        }
    }
}

impl std::error::Error for ParseError {}

// =============================================================================
// Output reports
// =============================================================================

/// Set the main key LEDs: [02, le32 mask]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLeds(pub Leds);

impl HidCommand for SetLeds {
    const REPORT_ID: u8 = output::SET_LEDS;
    const LEN: usize = 5;

    fn to_data(&self) -> Vec<u8> {
        self.0.bits().to_le_bytes().to_vec()
    }
}

/// Set the jog group LEDs: [04, flags]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetJogLeds(pub JogLeds);

impl HidCommand for SetJogLeds {
    const REPORT_ID: u8 = output::SET_JOG_LEDS;
    const LEN: usize = 2;

    fn to_data(&self) -> Vec<u8> {
        vec![self.0.bits()]
    }
}

/// Set the jog wheel mode: [03, mode, 0, 0, 0, 0, FF]
///
/// Bytes 2-5 are a reserved LE32 that stays zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetJogMode(pub JogMode);

impl HidCommand for SetJogMode {
    const REPORT_ID: u8 = output::SET_JOG_MODE;
    const LEN: usize = 7;

    fn to_data(&self) -> Vec<u8> {
        vec![self.0 as u8, 0, 0, 0, 0, protocol::JOG_MODE_SENTINEL]
    }
}

// =============================================================================
// Authentication frames (feature report 0x06)
// =============================================================================

fn auth_payload(phase: u8, value: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(AUTH_REPORT_SIZE - 1);
    data.push(phase);
    data.extend_from_slice(&value.to_le_bytes());
    data
}

/// Reset the device's auth state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthReset;

impl HidCommand for AuthReset {
    const REPORT_ID: u8 = AUTH_REPORT_ID;
    const LEN: usize = AUTH_REPORT_SIZE;

    fn to_data(&self) -> Vec<u8> {
        auth_payload(auth_phase::CHALLENGE, 0)
    }
}

/// Our counter-challenge to the device. The device's answer is never checked,
/// so this is always sent as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthHostChallenge;

impl HidCommand for AuthHostChallenge {
    const REPORT_ID: u8 = AUTH_REPORT_ID;
    const LEN: usize = AUTH_REPORT_SIZE;

    fn to_data(&self) -> Vec<u8> {
        auth_payload(auth_phase::HOST_CHALLENGE, 0)
    }
}

/// Our response to the device's challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthHostResponse(pub u64);

impl HidCommand for AuthHostResponse {
    const REPORT_ID: u8 = AUTH_REPORT_ID;
    const LEN: usize = AUTH_REPORT_SIZE;

    fn to_data(&self) -> Vec<u8> {
        auth_payload(auth_phase::HOST_RESPONSE, self.0)
    }
}

/// Device challenge (phase 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceChallenge {
    pub challenge: u64,
}

impl HidResponse for DeviceChallenge {
    const PHASE: u8 = auth_phase::CHALLENGE;

    fn from_payload(payload: &[u8; 8]) -> Self {
        Self {
            challenge: u64::from_le_bytes(*payload),
        }
    }
}

/// Device answer to our counter-challenge (phase 2); contents are ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceResponse;

impl HidResponse for DeviceResponse {
    const PHASE: u8 = auth_phase::DEVICE_RESPONSE;

    fn from_payload(_payload: &[u8; 8]) -> Self {
        Self
    }
}

/// Auth status (phase 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthStatus {
    /// Seconds until the device requires reauthentication
    pub timeout_secs: u16,
}

impl HidResponse for AuthStatus {
    const PHASE: u8 = auth_phase::STATUS;

    fn from_payload(payload: &[u8; 8]) -> Self {
        Self {
            timeout_secs: u16::from_le_bytes([payload[0], payload[1]]),
        }
    }
}

/// Empty GET_FEATURE buffer for the auth report, with the report ID preset
pub fn auth_feature_buffer() -> [u8; AUTH_REPORT_SIZE] {
    let mut buf = [0u8; AUTH_REPORT_SIZE];
    buf[0] = AUTH_REPORT_ID;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_set_leds_layout() {
        let buf = SetLeds(Leds::CAM1 | Leds::CLOSE_UP).build();
        assert_eq!(buf, vec![0x02, 0x01, 0x40, 0x00, 0x00]);
    }

    #[test]
    fn test_set_jog_leds_layout() {
        assert_eq!(SetJogLeds(JogLeds::SCRL).build(), vec![0x04, 0x04]);
        assert_eq!(SetJogLeds(JogLeds::empty()).build(), vec![0x04, 0x00]);
    }

    #[test]
    fn test_set_jog_mode_layout() {
        let buf = SetJogMode(JogMode::AbsoluteDeadZero).build();
        assert_eq!(buf, vec![0x03, 0x03, 0x00, 0x00, 0x00, 0x00, 0xFF]);
    }

    #[test]
    fn test_auth_reset_and_challenge_frames() {
        assert_eq!(AuthReset.build(), vec![0x06, 0x00, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            AuthHostChallenge.build(),
            vec![0x06, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_auth_response_frame_is_little_endian() {
        let buf = AuthHostResponse(0x0102_0304_0506_0708).build();
        assert_eq!(
            buf,
            vec![0x06, 0x03, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_parse_device_challenge() {
        let frame = [0x06, 0x00, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11];
        let parsed = DeviceChallenge::parse(&frame).unwrap();
        assert_eq!(parsed.challenge, 0x1122_3344_5566_7788);
    }

    #[test]
    fn test_parse_status_timeout() {
        let frame = [0x06, 0x04, 0x58, 0x02, 0, 0, 0, 0, 0, 0];
        assert_eq!(AuthStatus::parse(&frame).unwrap().timeout_secs, 600);
    }

    #[test]
    fn test_parse_wrong_phase() {
        let frame = [0x06, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            DeviceResponse::parse(&frame),
            Err(ParseError::PhaseMismatch {
                expected: 0x02,
                got: 0x00
            })
        );
    }

    #[test]
    fn test_parse_short_and_foreign_frames() {
        assert_eq!(
            AuthStatus::parse(&[0x06, 0x04, 0x1e]),
            Err(ParseError::TooShort {
                expected: 10,
                got: 3
            })
        );
        assert_eq!(
            AuthStatus::parse(&[0x05, 0x04, 0, 0, 0, 0, 0, 0, 0, 0]),
            Err(ParseError::UnknownReport(0x05))
        );
    }

    #[test]
    fn test_auth_feature_buffer() {
        let buf = auth_feature_buffer();
        assert_eq!(buf[0], 0x06);
        assert!(buf[1..].iter().all(|&b| b == 0));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Bytes 1-4 of the LED report carry the full mask little-endian.
        #[test]
        fn prop_set_leds_encodes_any_mask(mask in any::<u32>()) {
            let buf = SetLeds(Leds::from_bits_retain(mask)).build();
            prop_assert_eq!(buf.len(), 5);
            prop_assert_eq!(buf[0], 0x02);
            prop_assert_eq!(&buf[1..5], &mask.to_le_bytes()[..]);
        }
    }
}
