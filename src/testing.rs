//! Report writer double for unit tests

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use speededitor_transport::{JogLeds, JogMode, Leds, ReportWriter, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sent {
    Leds(Leds),
    JogLeds(JogLeds),
    JogMode(JogMode),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingWriter {
    connected: AtomicBool,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingWriter {
    pub(crate) fn connected() -> Self {
        Self {
            connected: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub(crate) fn leds_sent(&self) -> Vec<Leds> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Leds(leds) => Some(*leds),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.sent.lock().clear();
    }

    fn record(&self, sent: Sent) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::DeviceNotConnected);
        }
        self.sent.lock().push(sent);
        Ok(())
    }
}

impl ReportWriter for RecordingWriter {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_leds(&self, leds: Leds) -> Result<(), TransportError> {
        self.record(Sent::Leds(leds))
    }

    fn send_jog_leds(&self, leds: JogLeds) -> Result<(), TransportError> {
        self.record(Sent::JogLeds(leds))
    }

    fn send_jog_mode(&self, mode: JogMode) -> Result<(), TransportError> {
        self.record(Sent::JogMode(mode))
    }
}
