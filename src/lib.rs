//! Host-side driver for the Blackmagic DaVinci Resolve Speed Editor
//!
//! [`SpeedEditor`] authenticates the keyboard, turns its held-key snapshots
//! into key down/up/press events, and keeps the LEDs and jog mode in sync.
//! Wire-level details live in the `speededitor-transport` crate.
//!
//! ```no_run
//! use speededitor::{DeviceEvent, EditorConfig, ShutdownSignal, SpeedEditor};
//!
//! let editor = SpeedEditor::new(EditorConfig::default());
//! let mut events = editor.subscribe();
//! editor.connect(&ShutdownSignal::new())?;
//! while let Ok(event) = events.blocking_recv() {
//!     if let DeviceEvent::KeyPress(key) = event {
//!         println!("{key}");
//!     }
//! }
//! # Ok::<(), speededitor::EditorError>(())
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod jog;
pub mod keys;
pub mod led;

#[cfg(test)]
mod testing;

pub use config::EditorConfig;
pub use device::SpeedEditor;
pub use error::{EditorError, Result};
pub use events::DeviceEvent;
pub use jog::{jog_key_selection, JogState};
pub use keys::{KeyEdge, KeyEdgeDetector};
pub use led::LedState;

pub use speededitor_transport::{
    BatteryReport, Camera, JogLeds, JogMode, Key, KeySet, Leds, ShutdownSignal, Transition,
    TransportDeviceInfo, TransportError,
};
