//! Jog wheel mode and jog group LEDs

use std::sync::Arc;

use parking_lot::Mutex;
use speededitor_transport::{JogLeds, JogMode, Key, ReportWriter};
use tracing::debug;

use crate::error::Result;

/// LED and mode selected by each jog group key
pub fn jog_key_selection(key: Key) -> Option<(JogLeds, JogMode)> {
    match key {
        Key::SHTL => Some((JogLeds::SHTL, JogMode::AbsoluteDeadZero)),
        Key::JOG => Some((JogLeds::JOG, JogMode::Relative2)),
        Key::SCRL => Some((JogLeds::SCRL, JogMode::Relative2)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Jog {
    mode: JogMode,
    leds: JogLeds,
}

impl Default for Jog {
    fn default() -> Self {
        Self {
            mode: JogMode::Relative0,
            leds: JogLeds::JOG,
        }
    }
}

/// Current jog mode and jog LEDs. Only changes reach the device.
#[derive(Clone)]
pub struct JogState {
    state: Arc<Mutex<Jog>>,
    writer: Arc<dyn ReportWriter>,
}

impl JogState {
    pub fn new(writer: Arc<dyn ReportWriter>) -> Self {
        Self {
            state: Arc::new(Mutex::new(Jog::default())),
            writer,
        }
    }

    pub fn mode(&self) -> JogMode {
        self.state.lock().mode
    }

    pub fn leds(&self) -> JogLeds {
        self.state.lock().leds
    }

    pub fn set_mode(&self, mode: JogMode) -> Result<()> {
        let mut state = self.state.lock();
        if state.mode == mode {
            return Ok(());
        }
        state.mode = mode;
        if self.writer.is_connected() {
            self.writer.send_jog_mode(mode)?;
        } else {
            debug!("Not connected, jog mode {:?} kept locally", mode);
        }
        Ok(())
    }

    pub fn set_leds(&self, leds: JogLeds) -> Result<()> {
        let mut state = self.state.lock();
        if state.leds == leds {
            return Ok(());
        }
        state.leds = leds;
        if self.writer.is_connected() {
            self.writer.send_jog_leds(leds)?;
        } else {
            debug!("Not connected, jog LEDs {:?} kept locally", leds);
        }
        Ok(())
    }

    /// Apply the LED and mode bound to a jog group key.
    ///
    /// Returns `false` for keys outside the jog group.
    pub fn select_for_key(&self, key: Key) -> Result<bool> {
        let Some((leds, mode)) = jog_key_selection(key) else {
            return Ok(false);
        };
        self.set_leds(leds)?;
        self.set_mode(mode)?;
        Ok(true)
    }

    /// Restore defaults and send both fields unconditionally
    pub(crate) fn reset_and_push(&self) -> Result<()> {
        let mut state = self.state.lock();
        *state = Jog::default();
        if self.writer.is_connected() {
            self.writer.send_jog_leds(state.leds)?;
            self.writer.send_jog_mode(state.mode)?;
        }
        Ok(())
    }
}
