//! Events published by a connected Speed Editor

use speededitor_transport::{JogMode, Key};

/// Domain event delivered to every subscriber.
///
/// Events of one input report are sent before the next report is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    KeyDown(Key),
    KeyUp(Key),
    /// Completed down/up cycle; always follows the matching `KeyUp`
    KeyPress(Key),
    /// Jog wheel moved; `value` is a delta or a position depending on `mode`
    JogMoved { mode: JogMode, value: i32 },
    BatteryChanged { charging: bool, level: u8 },
    /// The device sent a report this driver does not understand
    UnrecognizedReport { report_id: u8 },
    /// The device stopped responding and the session was closed
    Disconnected,
}
