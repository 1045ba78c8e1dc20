//! Main key LED state
//!
//! Tracks the full LED mask and pushes it whole on every change. Cameras and
//! transitions are kept mutually exclusive here; the wire format allows any
//! combination.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use speededitor_transport::{Camera, Leds, ReportWriter, Transition};
use tracing::debug;

use crate::error::{EditorError, Result};

/// LED mask shared between the facade and its poll callback.
///
/// Clones share state. Constructing one never touches hardware.
#[derive(Clone)]
pub struct LedState {
    leds: Arc<Mutex<Leds>>,
    writer: Arc<dyn ReportWriter>,
}

impl fmt::Debug for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedState")
            .field("leds", &*self.leds.lock())
            .finish_non_exhaustive()
    }
}

impl LedState {
    pub fn new(writer: Arc<dyn ReportWriter>) -> Self {
        Self {
            leds: Arc::new(Mutex::new(Leds::empty())),
            writer,
        }
    }

    /// Current mask
    pub fn leds(&self) -> Leds {
        *self.leds.lock()
    }

    pub fn is_on(&self, led: Leds) -> bool {
        self.leds.lock().contains(led)
    }

    /// Turn one or more LEDs on or off
    pub fn set(&self, led: Leds, on: bool) -> Result<()> {
        self.update(|leds| leds.set(led, on))
    }

    pub fn toggle(&self, led: Leds) -> Result<()> {
        self.update(|leds| leds.toggle(led))
    }

    /// Light exactly one camera LED, or none
    pub fn switch_camera(&self, camera: Option<Camera>) -> Result<()> {
        self.update(|leds| {
            leds.remove(Leds::CAMERAS);
            if let Some(camera) = camera {
                leds.insert(camera.led());
            }
        })
    }

    /// Camera by keycap number; 0 clears the group
    pub fn switch_camera_index(&self, index: u8) -> Result<()> {
        let camera = match index {
            0 => None,
            n => Some(Camera::try_from(n).map_err(|n| {
                EditorError::InvalidArgument(format!("camera index {n} (expected 0-9)"))
            })?),
        };
        self.switch_camera(camera)
    }

    /// Light exactly one transition LED, or none
    pub fn switch_transition(&self, transition: Option<Transition>) -> Result<()> {
        self.update(|leds| {
            leds.remove(Leds::TRANSITIONS);
            if let Some(transition) = transition {
                leds.insert(transition.led());
            }
        })
    }

    /// Transition by number (1 cut, 2 dissolve, 3 smooth cut); 0 clears the group
    pub fn switch_transition_index(&self, index: u8) -> Result<()> {
        let transition = match index {
            0 => None,
            n => Some(Transition::try_from(n).map_err(|n| {
                EditorError::InvalidArgument(format!("transition index {n} (expected 0-3)"))
            })?),
        };
        self.switch_transition(transition)
    }

    /// Push the current mask again, e.g. after a reconnect
    pub fn sync_to_hardware(&self) -> Result<()> {
        let leds = self.leds.lock();
        self.push(*leds)
    }

    /// Clear the mask without contacting hardware
    pub(crate) fn reset(&self) {
        *self.leds.lock() = Leds::empty();
    }

    fn update(&self, f: impl FnOnce(&mut Leds)) -> Result<()> {
        let mut leds = self.leds.lock();
        f(&mut leds);
        // Push under the lock so concurrent callers reach the device in order
        self.push(*leds)
    }

    fn push(&self, leds: Leds) -> Result<()> {
        if !self.writer.is_connected() {
            debug!("Not connected, LED mask {:#07x} kept locally", leds.bits());
            return Ok(());
        }
        self.writer.send_leds(leds)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingWriter;

    fn state() -> (LedState, Arc<RecordingWriter>) {
        let writer = Arc::new(RecordingWriter::connected());
        (LedState::new(writer.clone()), writer)
    }

    #[test]
    fn test_construction_does_not_touch_hardware() {
        let (leds, writer) = state();
        assert_eq!(leds.leds(), Leds::empty());
        assert!(writer.leds_sent().is_empty());
    }

    #[test]
    fn test_set_pushes_full_mask() {
        let (leds, writer) = state();
        leds.set(Leds::CLOSE_UP, true).unwrap();
        leds.set(Leds::CUT, true).unwrap();
        leds.set(Leds::CLOSE_UP, false).unwrap();
        assert_eq!(
            writer.leds_sent(),
            vec![Leds::CLOSE_UP, Leds::CLOSE_UP | Leds::CUT, Leds::CUT]
        );
    }

    #[test]
    fn test_camera_switch_is_exclusive() {
        let (leds, writer) = state();
        leds.set(Leds::SNAP, true).unwrap();
        leds.switch_camera(Some(Camera::Cam1)).unwrap();
        leds.switch_camera(Some(Camera::Cam3)).unwrap();

        assert!(leds.is_on(Leds::CAM3));
        assert!(!leds.is_on(Leds::CAM1));
        assert!(leds.is_on(Leds::SNAP));
        assert_eq!(writer.leds_sent().len(), 3);
    }

    #[test]
    fn test_camera_none_clears_group() {
        let (leds, _writer) = state();
        leds.switch_camera(Some(Camera::Cam9)).unwrap();
        leds.switch_camera_index(0).unwrap();
        assert!(!leds.leds().intersects(Leds::CAMERAS));
    }

    #[test]
    fn test_out_of_range_camera_does_not_push() {
        let (leds, writer) = state();
        let err = leds.switch_camera_index(10).unwrap_err();
        assert!(matches!(err, EditorError::InvalidArgument(_)));
        assert!(writer.leds_sent().is_empty());
    }

    #[test]
    fn test_transition_switch_is_exclusive() {
        let (leds, writer) = state();
        leds.switch_transition(Some(Transition::Cut)).unwrap();
        leds.switch_transition_index(2).unwrap();
        assert_eq!(leds.leds() & Leds::TRANSITIONS, Leds::DIS);

        assert!(matches!(
            leds.switch_transition_index(4),
            Err(EditorError::InvalidArgument(_))
        ));
        assert_eq!(writer.leds_sent().len(), 2);
    }

    #[test]
    fn test_disconnected_keeps_state_without_push() {
        let (leds, writer) = state();
        writer.set_connected(false);
        leds.set(Leds::CLOSE_UP, true).unwrap();
        leds.sync_to_hardware().unwrap();
        assert!(leds.is_on(Leds::CLOSE_UP));
        assert!(writer.leds_sent().is_empty());

        writer.set_connected(true);
        leds.set(Leds::CUT, true).unwrap();
        writer.clear();
        leds.sync_to_hardware().unwrap();
        assert_eq!(writer.leds_sent(), vec![Leds::CLOSE_UP | Leds::CUT]);
    }

    #[test]
    fn test_clones_share_mask() {
        let (leds, _writer) = state();
        let other = leds.clone();
        other.toggle(Leds::LIVE_OWR).unwrap();
        assert!(leds.is_on(Leds::LIVE_OWR));
        leds.reset();
        assert_eq!(other.leds(), Leds::empty());
    }
}
