//! Transport layer for the Blackmagic DaVinci Resolve Speed Editor
//!
//! This crate owns everything that touches the wire:
//!
//! - the challenge-response engine the keyboard requires before it sends input
//! - the report codec (LED, jog LED and jog mode output reports, the three
//!   input reports, and the feature frames of the handshake)
//! - the [`Session`] that discovers, authenticates and polls the device and
//!   reauthenticates it before its timeout expires

pub mod auth;
pub mod command;
pub mod device_registry;
pub mod error;
pub mod event_parser;
pub mod protocol;
pub mod types;

mod discovery;
mod hid;
mod session;
mod shutdown;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use auth::compute_response;
pub use command::{
    AuthHostChallenge, AuthHostResponse, AuthReset, AuthStatus, DeviceChallenge, DeviceResponse,
    HidCommand, HidResponse, ParseError, SetJogLeds, SetJogMode, SetLeds,
};
pub use device_registry::{is_speed_editor, PRODUCT_ID, VENDOR_ID};
pub use error::TransportError;
pub use event_parser::{parse_input_report, EventReaderConfig, ReaderEvent};
pub use types::{
    BatteryReport, Camera, InputReport, JogLeds, JogMode, JogReport, Key, KeyReport, KeySet,
    Leds, Transition, TransportDeviceInfo,
};

pub use discovery::wait_for_device;
pub use hid::{HidApiBackend, HidBackend, HidStream};
pub use session::{authenticate, reauth_delay, Session, SessionConfig};
pub use shutdown::ShutdownSignal;

/// Output side of a connected device.
///
/// LED and jog state push through this trait, so they work the same against a
/// live [`Session`] or a test double.
pub trait ReportWriter: Send + Sync {
    /// Whether writes can currently reach the device
    fn is_connected(&self) -> bool;

    /// Send the full main LED mask (output report 0x02)
    fn send_leds(&self, leds: Leds) -> Result<(), TransportError>;

    /// Send the jog group LEDs (output report 0x04)
    fn send_jog_leds(&self, leds: JogLeds) -> Result<(), TransportError>;

    /// Select the jog wheel mode (output report 0x03)
    fn send_jog_mode(&self, mode: JogMode) -> Result<(), TransportError>;
}
