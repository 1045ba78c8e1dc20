//! Protocol constants for Speed Editor communication

/// Size of an input report read by the poll loop
pub const INPUT_REPORT_SIZE: usize = 64;

/// Size of every authentication feature report
pub const AUTH_REPORT_SIZE: usize = 10;

/// Output report IDs (host → device, interrupt OUT endpoint)
pub mod output {
    /// LE32 bitfield of the main key LEDs
    pub const SET_LEDS: u8 = 0x02;
    /// Jog wheel mode selection
    pub const SET_JOG_MODE: u8 = 0x03;
    /// 8-bit bitfield of the jog group LEDs
    pub const SET_JOG_LEDS: u8 = 0x04;

    /// Get human-readable name for an output report ID
    pub fn name(id: u8) -> &'static str {
        match id {
            SET_LEDS => "SET_LEDS",
            SET_JOG_MODE => "SET_JOG_MODE",
            SET_JOG_LEDS => "SET_JOG_LEDS",
            super::AUTH_REPORT_ID => "AUTH",
            _ => "UNKNOWN",
        }
    }
}

/// Input report IDs (device → host).
///
/// **Note:** input and output report IDs are separate namespaces: `0x03` is
/// a jog update when read but a jog mode selection when written, and `0x04`
/// is the held-key array when read but the jog LED bitfield when written.
pub mod input {
    /// Jog wheel update: [03, mode, le32 value, ...]
    pub const JOG: u8 = 0x03;
    /// Held keys: [04, le16 x 6]
    pub const KEYS: u8 = 0x04;
    /// Battery status: [07, charging, level]
    pub const BATTERY: u8 = 0x07;

    /// Get human-readable name for an input report ID
    pub fn name(id: u8) -> &'static str {
        match id {
            JOG => "JOG",
            KEYS => "KEYS",
            BATTERY => "BATTERY",
            _ => "UNKNOWN",
        }
    }
}

/// Feature report ID used by every authentication frame
pub const AUTH_REPORT_ID: u8 = 0x06;

/// Authentication phase codes (byte 1 of an auth frame)
pub mod auth_phase {
    /// Host → device: reset the auth state machine.
    /// Device → host: the device's challenge.
    pub const CHALLENGE: u8 = 0x00;
    /// Host → device: our counter-challenge
    pub const HOST_CHALLENGE: u8 = 0x01;
    /// Device → host: the device's response to our counter-challenge
    pub const DEVICE_RESPONSE: u8 = 0x02;
    /// Host → device: our computed response
    pub const HOST_RESPONSE: u8 = 0x03;
    /// Device → host: auth status carrying the reauth timeout
    pub const STATUS: u8 = 0x04;

    /// Get human-readable name for a phase code
    pub fn name(phase: u8) -> &'static str {
        match phase {
            CHALLENGE => "challenge",
            HOST_CHALLENGE => "host challenge",
            DEVICE_RESPONSE => "device response",
            HOST_RESPONSE => "host response",
            STATUS => "status",
            _ => "unknown",
        }
    }
}

/// Fixed trailer byte of the jog mode output report
pub const JOG_MODE_SENTINEL: u8 = 0xFF;

/// Number of key slots in a key report
pub const KEY_SLOTS: usize = 6;

/// Timing constants
pub mod timing {
    /// Poll loop read timeout; also bounds shutdown latency of the loop
    pub const READ_TIMEOUT_MS: i32 = 20;
    /// Delay between device discovery attempts
    pub const DISCOVERY_INTERVAL_MS: u64 = 1000;
    /// Back-off after a failed read before polling again
    pub const ERROR_SLEEP_MS: u64 = 100;
    /// Consecutive read failures before the device is considered gone
    pub const MAX_READ_ERRORS: u32 = 25;
    /// Reauthenticate this many seconds before the device's timeout expires
    pub const REAUTH_MARGIN_SECS: u16 = 10;
    /// How long close() waits for worker threads to exit
    pub const SHUTDOWN_GRACE_MS: u64 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_names() {
        assert_eq!(output::name(output::SET_LEDS), "SET_LEDS");
        assert_eq!(output::name(AUTH_REPORT_ID), "AUTH");
        assert_eq!(output::name(0x42), "UNKNOWN");
    }

    #[test]
    fn test_input_names_share_ids_with_output() {
        assert_eq!(input::name(0x03), "JOG");
        assert_eq!(output::name(0x03), "SET_JOG_MODE");
        assert_eq!(input::name(0x04), "KEYS");
        assert_eq!(output::name(0x04), "SET_JOG_LEDS");
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(auth_phase::name(auth_phase::STATUS), "status");
        assert_eq!(auth_phase::name(9), "unknown");
    }
}
