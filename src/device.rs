//! Speed Editor facade
//!
//! Ties a [`Session`] to key edge detection, LED and jog state, and fans
//! domain events out over a broadcast channel.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use speededitor_transport::{
    BatteryReport, Camera, HidApiBackend, HidBackend, InputReport, JogLeds, JogMode, Key, KeySet,
    Leds, ParseError, ReaderEvent, ReportWriter, Session, ShutdownSignal, Transition,
    TransportDeviceInfo, TransportError,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::events::DeviceEvent;
use crate::jog::JogState;
use crate::keys::{KeyEdge, KeyEdgeDetector};
use crate::led::LedState;

/// The currently open session, if any
#[derive(Default)]
struct SessionSlot {
    session: RwLock<Option<Arc<Session>>>,
}

impl SessionSlot {
    fn current(&self) -> Option<Arc<Session>> {
        self.session.read().clone()
    }

    fn take(&self) -> Option<Arc<Session>> {
        self.session.write().take()
    }
}

impl ReportWriter for SessionSlot {
    fn is_connected(&self) -> bool {
        self.session
            .read()
            .as_ref()
            .is_some_and(|s| s.is_connected())
    }

    fn send_leds(&self, leds: Leds) -> std::result::Result<(), TransportError> {
        self.current()
            .ok_or(TransportError::DeviceNotConnected)?
            .send_leds(leds)
    }

    fn send_jog_leds(&self, leds: JogLeds) -> std::result::Result<(), TransportError> {
        self.current()
            .ok_or(TransportError::DeviceNotConnected)?
            .send_jog_leds(leds)
    }

    fn send_jog_mode(&self, mode: JogMode) -> std::result::Result<(), TransportError> {
        self.current()
            .ok_or(TransportError::DeviceNotConnected)?
            .send_jog_mode(mode)
    }
}

/// State reachable from the poll thread
struct Shared {
    slot: Arc<SessionSlot>,
    keys: Mutex<KeyEdgeDetector>,
    battery: Mutex<Option<BatteryReport>>,
    leds: LedState,
    jog: JogState,
    events: broadcast::Sender<DeviceEvent>,
    follow_keys: bool,
}

impl Shared {
    fn emit(&self, event: DeviceEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn handle(&self, event: ReaderEvent) {
        match event {
            ReaderEvent::Report(InputReport::Keys(report)) => self.handle_keys(report.keys),
            ReaderEvent::Report(InputReport::Jog(jog)) => self.emit(DeviceEvent::JogMoved {
                mode: jog.mode,
                value: jog.value,
            }),
            ReaderEvent::Report(InputReport::Battery(battery)) => {
                *self.battery.lock() = Some(battery);
                self.emit(DeviceEvent::BatteryChanged {
                    charging: battery.charging,
                    level: battery.level,
                });
            }
            ReaderEvent::DecodeError(ParseError::UnknownReport(report_id)) => {
                self.emit(DeviceEvent::UnrecognizedReport { report_id })
            }
            ReaderEvent::DecodeError(e) => warn!("Dropped malformed report: {}", e),
            ReaderEvent::Disconnected => {
                warn!("Speed Editor stopped responding");
                if let Some(session) = self.slot.take() {
                    session.close();
                }
                self.emit(DeviceEvent::Disconnected);
            }
        }
    }

    fn handle_keys(&self, keys: KeySet) {
        let edges = self.keys.lock().update(keys);
        for edge in edges {
            match edge {
                KeyEdge::Down(key) => self.emit(DeviceEvent::KeyDown(key)),
                KeyEdge::Up(key) => {
                    self.emit(DeviceEvent::KeyUp(key));
                    if self.follow_keys {
                        self.follow_key(key);
                    }
                }
                KeyEdge::Press(key) => self.emit(DeviceEvent::KeyPress(key)),
            }
        }
    }

    /// Let a released key drive its own LED or jog selection
    fn follow_key(&self, key: Key) {
        let result = if let Some(camera) = Camera::for_key(key) {
            self.leds.switch_camera(Some(camera))
        } else if let Some(transition) = Transition::for_key(key) {
            self.leds.switch_transition(Some(transition))
        } else if let Some(led) = Leds::for_key(key) {
            self.leds.toggle(led)
        } else {
            self.jog.select_for_key(key).map(|_| ())
        };
        if let Err(e) = result {
            warn!("Failed to update state for {}: {}", key, e);
        }
    }
}

/// A Speed Editor: connect it, subscribe to its events, drive its LEDs.
///
/// Construction never touches hardware. Dropping the editor disconnects it.
pub struct SpeedEditor {
    backend: Arc<dyn HidBackend>,
    config: EditorConfig,
    shared: Arc<Shared>,
    connect_lock: Mutex<()>,
}

impl SpeedEditor {
    /// Editor backed by the system HID stack
    pub fn new(config: EditorConfig) -> Self {
        Self::with_backend(Arc::new(HidApiBackend::new()), config)
    }

    pub fn with_backend(backend: Arc<dyn HidBackend>, config: EditorConfig) -> Self {
        let slot = Arc::new(SessionSlot::default());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let shared = Arc::new(Shared {
            leds: LedState::new(slot.clone()),
            jog: JogState::new(slot.clone()),
            slot,
            keys: Mutex::new(KeyEdgeDetector::new()),
            battery: Mutex::new(None),
            events,
            follow_keys: config.follow_keys,
        });
        Self {
            backend,
            config,
            shared,
            connect_lock: Mutex::new(()),
        }
    }

    /// Wait for the device, authenticate it and start polling.
    ///
    /// Blocks until connected or until `cancel` fires. LED, jog and key
    /// state are reset and the defaults are pushed to the device.
    pub fn connect(&self, cancel: &ShutdownSignal) -> Result<()> {
        let _connecting = self.connect_lock.lock();
        if self.shared.slot.current().is_some() {
            return Err(EditorError::AlreadyConnected);
        }

        self.shared.keys.lock().reset();
        self.shared.leds.reset();

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let session = Session::connect(
            self.backend.as_ref(),
            &self.config.session_config(),
            cancel,
            move |event| {
                if let Some(shared) = shared.upgrade() {
                    shared.handle(event);
                }
            },
        )?;
        let path = session.device_info().device_path.clone();
        *self.shared.slot.session.write() = Some(Arc::new(session));

        // A half-initialised device is closed so the caller can retry
        if let Err(e) = self.push_defaults() {
            warn!("Failed to push defaults to {}: {}", path, e);
            if let Some(session) = self.shared.slot.take() {
                session.close();
            }
            return Err(e);
        }
        info!("Speed Editor ready at {}", path);
        Ok(())
    }

    fn push_defaults(&self) -> Result<()> {
        self.shared.leds.sync_to_hardware()?;
        self.shared.jog.reset_and_push()
    }

    /// Close the session. Idempotent.
    pub fn disconnect(&self) {
        if let Some(session) = self.shared.slot.take() {
            session.close();
            info!("Speed Editor disconnected");
        }
    }

    /// Disconnect and release the editor
    pub fn close(self) {
        self.disconnect();
    }

    /// New receiver for device events
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.slot.is_connected()
    }

    pub fn device_info(&self) -> Option<TransportDeviceInfo> {
        self.shared.slot.current().map(|s| s.device_info().clone())
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// LED operations
    pub fn led_state(&self) -> &LedState {
        &self.shared.leds
    }

    /// Jog mode and jog LED operations
    pub fn jog_state(&self) -> &JogState {
        &self.shared.jog
    }

    /// Current main LED mask
    pub fn leds(&self) -> Leds {
        self.shared.leds.leds()
    }

    pub fn jog_mode(&self) -> JogMode {
        self.shared.jog.mode()
    }

    pub fn jog_leds(&self) -> JogLeds {
        self.shared.jog.leds()
    }

    /// Keys held as of the last key report
    pub fn held_keys(&self) -> KeySet {
        self.shared.keys.lock().held().clone()
    }

    /// Last battery report; kept across reconnects
    pub fn battery(&self) -> Option<BatteryReport> {
        *self.shared.battery.lock()
    }

    pub fn charging(&self) -> bool {
        self.battery().is_some_and(|b| b.charging)
    }

    pub fn battery_level(&self) -> Option<u8> {
        self.battery().map(|b| b.level)
    }
}

impl Drop for SpeedEditor {
    fn drop(&mut self) {
        self.disconnect();
    }
}
