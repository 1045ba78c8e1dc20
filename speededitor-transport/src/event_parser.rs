//! Input report decoding and the poll loop
//!
//! Parsing is pure; [`run_event_reader_loop`] owns the blocking read side
//! and hands decoded reports to a callback on the poll thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::command::ParseError;
use crate::hid::HidStream;
use crate::protocol::{input, timing, INPUT_REPORT_SIZE, KEY_SLOTS};
use crate::shutdown::ShutdownSignal;
use crate::types::{BatteryReport, InputReport, JogMode, JogReport, Key, KeyReport, KeySet};

/// Transport handle shared between the poll thread and writers.
///
/// `None` once the session has been closed.
pub type SharedStream = Arc<Mutex<Option<Box<dyn HidStream>>>>;

const JOG_REPORT_LEN: usize = 7;
const KEY_REPORT_LEN: usize = 1 + KEY_SLOTS * 2;
const BATTERY_REPORT_LEN: usize = 3;

/// Decode a raw input report.
///
/// Returns `Ok(None)` for empty or truncated reports; short frames occur
/// occasionally and are not worth surfacing. Unknown report IDs are errors.
pub fn parse_input_report(data: &[u8]) -> Result<Option<InputReport>, ParseError> {
    let Some(&report_id) = data.first() else {
        return Ok(None);
    };

    match report_id {
        input::JOG => parse_jog(data),
        input::KEYS => Ok(parse_keys(data)),
        input::BATTERY => Ok(parse_battery(data)),
        other => Err(ParseError::UnknownReport(other)),
    }
}

fn parse_jog(data: &[u8]) -> Result<Option<InputReport>, ParseError> {
    if data.len() < JOG_REPORT_LEN {
        return Ok(None);
    }
    let mode = JogMode::from_u8(data[1]).ok_or(ParseError::InvalidValue {
        field: "jog mode",
        value: data[1],
    })?;
    let value = i32::from_le_bytes([data[2], data[3], data[4], data[5]]);
    Ok(Some(InputReport::Jog(JogReport { mode, value })))
}

fn parse_keys(data: &[u8]) -> Option<InputReport> {
    if data.len() < KEY_REPORT_LEN {
        return None;
    }
    let keys: KeySet = data[1..KEY_REPORT_LEN]
        .chunks_exact(2)
        .map(|c| Key(u16::from_le_bytes([c[0], c[1]])))
        .filter(|&k| k != Key::NONE)
        .collect();
    Some(InputReport::Keys(KeyReport { keys }))
}

fn parse_battery(data: &[u8]) -> Option<InputReport> {
    if data.len() < BATTERY_REPORT_LEN {
        return None;
    }
    Some(InputReport::Battery(BatteryReport {
        charging: data[1] != 0,
        level: data[2],
    }))
}

/// What the poll loop hands to its callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// A successfully decoded report
    Report(InputReport),
    /// A report that could not be decoded; the loop keeps running
    DecodeError(ParseError),
    /// The device stopped answering; the loop has exited
    Disconnected,
}

/// Configuration for the poll loop
#[derive(Debug, Clone)]
pub struct EventReaderConfig {
    /// Read timeout in milliseconds; bounds shutdown latency
    pub read_timeout_ms: i32,
    /// Back-off after a read error
    pub error_sleep_ms: u64,
    /// Consecutive read errors before giving up on the device
    pub max_read_errors: u32,
}

impl Default for EventReaderConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: timing::READ_TIMEOUT_MS,
            error_sleep_ms: timing::ERROR_SLEEP_MS,
            max_read_errors: timing::MAX_READ_ERRORS,
        }
    }
}

/// Poll input reports until shutdown or until the device disappears.
///
/// The stream lock is held only for the duration of one read and released
/// fairly afterwards, so output writes interleave with polling. The callback
/// runs on the polling thread; every event of one report is delivered before
/// the next read starts.
pub fn run_event_reader_loop<F>(
    stream: SharedStream,
    shutdown: ShutdownSignal,
    connected: Arc<AtomicBool>,
    mut on_event: F,
    config: EventReaderConfig,
) where
    F: FnMut(ReaderEvent),
{
    debug!("Poll thread started");
    let mut buf = [0u8; INPUT_REPORT_SIZE];
    let mut consecutive_errors = 0u32;

    while !shutdown.is_triggered() {
        let guard = stream.lock();
        let Some(device) = guard.as_ref() else {
            debug!("Stream closed, poll thread exiting");
            break;
        };
        // Read with short timeout - wakes immediately on data
        let result = device.read_timeout(&mut buf, config.read_timeout_ms);
        MutexGuard::unlock_fair(guard);

        match result {
            Ok(len) if len > 0 => {
                consecutive_errors = 0;
                debug!("Read {} bytes: {:02X?}", len, &buf[..len.min(16)]);
                match parse_input_report(&buf[..len]) {
                    Ok(Some(report)) => on_event(ReaderEvent::Report(report)),
                    Ok(None) => debug!("Ignoring short report ({} bytes)", len),
                    Err(e) => {
                        warn!("Failed to decode input report: {}", e);
                        on_event(ReaderEvent::DecodeError(e));
                    }
                }
            }
            Ok(_) => {
                // Timeout, no data
                consecutive_errors = 0;
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!(
                    "Read error ({}/{}): {}",
                    consecutive_errors, config.max_read_errors, e
                );
                if consecutive_errors >= config.max_read_errors {
                    connected.store(false, Ordering::SeqCst);
                    on_event(ReaderEvent::Disconnected);
                    break;
                }
                if shutdown.wait_timeout(Duration::from_millis(config.error_sleep_ms)) {
                    break;
                }
            }
        }
    }

    debug!("Poll thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key_report(codes: &[u16]) -> Vec<u8> {
        let mut buf = vec![input::KEYS];
        for slot in 0..KEY_SLOTS {
            let code = codes.get(slot).copied().unwrap_or(0);
            buf.extend_from_slice(&code.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_stop_play_key_report() {
        let data = [0x04, 0x3c, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let report = parse_input_report(&data).unwrap();
        assert_eq!(
            report,
            Some(InputReport::Keys(KeyReport {
                keys: KeySet::from([Key::STOP_PLAY])
            }))
        );
    }

    #[test]
    fn test_short_key_report_is_ignored() {
        let data = [0x04, 0x3c, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(parse_input_report(&data), Ok(None));
    }

    #[test]
    fn test_duplicate_keys_collapse() {
        let data = key_report(&[0x33, 0x33, 0x3c, 0, 0x33, 0]);
        let Ok(Some(InputReport::Keys(report))) = parse_input_report(&data) else {
            panic!("expected key report");
        };
        assert_eq!(report.keys, KeySet::from([Key::CAM1, Key::STOP_PLAY]));
    }

    #[test]
    fn test_unknown_key_codes_are_kept() {
        let data = key_report(&[0x0123]);
        let Ok(Some(InputReport::Keys(report))) = parse_input_report(&data) else {
            panic!("expected key report");
        };
        assert!(report.keys.contains(&Key(0x0123)));
    }

    #[test]
    fn test_full_size_buffer_decodes() {
        let mut data = [0u8; INPUT_REPORT_SIZE];
        data[..3].copy_from_slice(&[0x07, 0x01, 0x55]);
        assert_eq!(
            parse_input_report(&data),
            Ok(Some(InputReport::Battery(BatteryReport {
                charging: true,
                level: 85
            })))
        );
    }

    #[test]
    fn test_jog_report() {
        let data = [0x03, 0x00, 0xfe, 0xff, 0xff, 0xff, 0x00];
        assert_eq!(
            parse_input_report(&data),
            Ok(Some(InputReport::Jog(JogReport {
                mode: JogMode::Relative0,
                value: -2
            })))
        );
        assert_eq!(parse_input_report(&data[..6]), Ok(None));
    }

    #[test]
    fn test_jog_report_with_unknown_mode() {
        let data = [0x03, 0x09, 0, 0, 0, 0, 0];
        assert_eq!(
            parse_input_report(&data),
            Err(ParseError::InvalidValue {
                field: "jog mode",
                value: 9
            })
        );
    }

    #[test]
    fn test_short_battery_report_is_ignored() {
        assert_eq!(parse_input_report(&[0x07, 0x00]), Ok(None));
    }

    #[test]
    fn test_unknown_report_id() {
        assert_eq!(
            parse_input_report(&[0x42, 0x00, 0x00]),
            Err(ParseError::UnknownReport(0x42))
        );
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(parse_input_report(&[]), Ok(None));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_jog_value_decodes_over_full_range(value in any::<i32>(), mode in 0u8..4) {
            let mut data = vec![input::JOG, mode];
            data.extend_from_slice(&value.to_le_bytes());
            data.push(0);
            let report = parse_input_report(&data).unwrap();
            prop_assert_eq!(
                report,
                Some(InputReport::Jog(JogReport {
                    mode: JogMode::from_u8(mode).unwrap(),
                    value,
                }))
            );
        }

        #[test]
        fn prop_key_report_never_contains_none(codes in proptest::collection::vec(any::<u16>(), KEY_SLOTS)) {
            let data = key_report(&codes);
            let Ok(Some(InputReport::Keys(report))) = parse_input_report(&data) else {
                return Err(TestCaseError::fail("expected key report"));
            };
            prop_assert!(!report.keys.contains(&Key::NONE));
            prop_assert!(report.keys.len() <= KEY_SLOTS);
        }
    }
}
