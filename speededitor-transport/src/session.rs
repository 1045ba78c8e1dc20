//! Device session: handshake, poll thread and periodic reauthentication
//!
//! A [`Session`] exclusively owns the open HID handle. The handle lives behind
//! a mutex shared by the poll thread, the reauth thread and output writes; the
//! full handshake runs as one critical section on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::auth::compute_response;
use crate::command::{
    auth_feature_buffer, AuthHostChallenge, AuthHostResponse, AuthReset, AuthStatus,
    DeviceChallenge, DeviceResponse, HidCommand, HidResponse, SetJogLeds, SetJogMode, SetLeds,
};
use crate::device_registry::{PRODUCT_ID, VENDOR_ID};
use crate::discovery::wait_for_device;
use crate::error::TransportError;
use crate::event_parser::{run_event_reader_loop, EventReaderConfig, ReaderEvent, SharedStream};
use crate::hid::{HidBackend, HidStream};
use crate::protocol::{auth_phase, output, timing};
use crate::shutdown::ShutdownSignal;
use crate::types::{JogLeds, JogMode, Leds, TransportDeviceInfo};
use crate::ReportWriter;

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub vid: u16,
    pub pid: u16,
    /// Delay between discovery attempts; also the reauth retry interval
    pub discovery_interval: Duration,
    /// How long `close()` waits for worker threads
    pub shutdown_grace: Duration,
    /// Reauthenticate this many seconds before the device timeout
    pub reauth_margin_secs: u16,
    pub reader: EventReaderConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vid: VENDOR_ID,
            pid: PRODUCT_ID,
            discovery_interval: Duration::from_millis(timing::DISCOVERY_INTERVAL_MS),
            shutdown_grace: Duration::from_millis(timing::SHUTDOWN_GRACE_MS),
            reauth_margin_secs: timing::REAUTH_MARGIN_SECS,
            reader: EventReaderConfig::default(),
        }
    }
}

/// Delay before the next reauthentication, if the device asks for one
pub fn reauth_delay(timeout_secs: u16, margin_secs: u16) -> Option<Duration> {
    (timeout_secs > margin_secs)
        .then(|| Duration::from_secs(u64::from(timeout_secs - margin_secs)))
}

/// Run the full challenge-response exchange.
///
/// Returns the reauth timeout reported by the device, in seconds. The caller
/// must hold exclusive access to `device` for the whole exchange.
pub fn authenticate(device: &dyn HidStream) -> Result<u16, TransportError> {
    debug!("Auth: resetting");
    device.send_feature_report(&AuthReset.build())?;

    let challenge = read_auth_frame::<DeviceChallenge>(device)?.challenge;
    debug!("Auth: device challenge {:016x}", challenge);

    // The device's own answer is not checked, so our challenge is zero
    device.send_feature_report(&AuthHostChallenge.build())?;
    read_auth_frame::<DeviceResponse>(device)?;

    let response = compute_response(challenge);
    device.send_feature_report(&AuthHostResponse(response).build())?;

    let status = read_auth_frame::<AuthStatus>(device)?;
    debug!("Auth: accepted, timeout {}s", status.timeout_secs);
    Ok(status.timeout_secs)
}

fn read_auth_frame<R: HidResponse>(device: &dyn HidStream) -> Result<R, TransportError> {
    let phase = auth_phase::name(R::PHASE);
    let mut buf = auth_feature_buffer();
    let len = device.get_feature_report(&mut buf)?.min(buf.len());
    debug!("Auth: {} frame {:02X?}", phase, &buf[..len]);
    R::parse(&buf[..len]).map_err(|e| TransportError::auth(phase, e.to_string()))
}

/// An authenticated connection to one Speed Editor
pub struct Session {
    stream: SharedStream,
    info: TransportDeviceInfo,
    shutdown: ShutdownSignal,
    connected: Arc<AtomicBool>,
    closed: AtomicBool,
    poll_thread: Mutex<Option<JoinHandle<()>>>,
    reauth_thread: Mutex<Option<JoinHandle<()>>>,
    shutdown_grace: Duration,
}

impl Session {
    /// Discover, open and authenticate the device, then start polling.
    ///
    /// Blocks until the device is found or `cancel` fires. `on_event` runs on
    /// the poll thread for every decoded report.
    pub fn connect<F>(
        backend: &dyn HidBackend,
        config: &SessionConfig,
        cancel: &ShutdownSignal,
        on_event: F,
    ) -> Result<Self, TransportError>
    where
        F: FnMut(ReaderEvent) + Send + 'static,
    {
        let info = wait_for_device(
            backend,
            config.vid,
            config.pid,
            config.discovery_interval,
            cancel,
        )?;
        let device = backend.open(&info)?;
        let timeout_secs = authenticate(device.as_ref())?;
        info!(
            "Authenticated with Speed Editor at {} (reauth timeout {}s)",
            info.device_path, timeout_secs
        );

        let stream: SharedStream = Arc::new(Mutex::new(Some(device)));
        let shutdown = ShutdownSignal::new();
        let connected = Arc::new(AtomicBool::new(true));

        let poll_thread = {
            let stream = stream.clone();
            let shutdown = shutdown.clone();
            let connected = connected.clone();
            let reader = config.reader.clone();
            std::thread::Builder::new()
                .name("speededitor-poll".into())
                .spawn(move || run_event_reader_loop(stream, shutdown, connected, on_event, reader))
                .map_err(|e| TransportError::Internal(format!("failed to spawn poll thread: {e}")))?
        };

        let session = Self {
            stream,
            info,
            shutdown,
            connected,
            closed: AtomicBool::new(false),
            poll_thread: Mutex::new(Some(poll_thread)),
            reauth_thread: Mutex::new(None),
            shutdown_grace: config.shutdown_grace,
        };

        match reauth_delay(timeout_secs, config.reauth_margin_secs) {
            Some(delay) => {
                debug!("Reauthentication scheduled in {:?}", delay);
                let stream = session.stream.clone();
                let shutdown = session.shutdown.clone();
                let margin = config.reauth_margin_secs;
                let retry = config.discovery_interval;
                // On failure `session` drops here, which stops the poll thread
                let handle = std::thread::Builder::new()
                    .name("speededitor-reauth".into())
                    .spawn(move || run_reauth_loop(stream, shutdown, delay, margin, retry))
                    .map_err(|e| {
                        TransportError::Internal(format!("failed to spawn reauth thread: {e}"))
                    })?;
                *session.reauth_thread.lock() = Some(handle);
            }
            None => debug!("Device requested no reauthentication"),
        }

        Ok(session)
    }

    pub fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    /// Stop both worker threads and release the device.
    ///
    /// Idempotent. Threads still running after the grace period are detached.
    /// Safe to call from the poll thread's own callback.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Closing session");
        self.connected.store(false, Ordering::SeqCst);
        self.shutdown.trigger();

        let deadline = Instant::now() + self.shutdown_grace;
        let poll = self.poll_thread.lock().take();
        let reauth = self.reauth_thread.lock().take();
        for handle in [poll, reauth].into_iter().flatten() {
            join_with_grace(handle, deadline);
        }

        if self.stream.lock().take().is_some() {
            info!("Speed Editor at {} closed", self.info.device_path);
        }
    }

    fn write_report(&self, buf: &[u8]) -> Result<(), TransportError> {
        let guard = self.stream.lock();
        let device = guard.as_ref().ok_or(TransportError::DeviceNotConnected)?;
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::DeviceNotConnected);
        }
        let report_id = buf.first().copied().unwrap_or(0);
        debug!("Write {}: {:02X?}", output::name(report_id), buf);
        device.write(buf)?;
        Ok(())
    }
}

impl ReportWriter for Session {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_leds(&self, leds: Leds) -> Result<(), TransportError> {
        self.write_report(&SetLeds(leds).build())
    }

    fn send_jog_leds(&self, leds: JogLeds) -> Result<(), TransportError> {
        self.write_report(&SetJogLeds(leds).build())
    }

    fn send_jog_mode(&self, mode: JogMode) -> Result<(), TransportError> {
        self.write_report(&SetJogMode(mode).build())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn join_with_grace(handle: JoinHandle<()>, deadline: Instant) {
    let name = handle.thread().name().unwrap_or("worker").to_owned();
    if handle.thread().id() == std::thread::current().id() {
        debug!("{} closing its own session, not joining", name);
        return;
    }
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("{} did not stop within the grace period, detaching", name);
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    if handle.join().is_err() {
        warn!("{} panicked", name);
    }
}

fn run_reauth_loop(
    stream: SharedStream,
    shutdown: ShutdownSignal,
    first_delay: Duration,
    margin_secs: u16,
    retry: Duration,
) {
    let mut delay = first_delay;
    loop {
        if shutdown.wait_timeout(delay) {
            break;
        }

        let result = {
            let guard = stream.lock();
            let Some(device) = guard.as_ref() else {
                break;
            };
            authenticate(device.as_ref())
        };

        match result {
            Ok(timeout_secs) => match reauth_delay(timeout_secs, margin_secs) {
                Some(next) => {
                    info!("Reauthenticated, next in {:?}", next);
                    delay = next;
                }
                None => {
                    info!("Reauthenticated, device requested no further reauth");
                    break;
                }
            },
            Err(e) => {
                error!("Reauthentication failed: {}", e);
                delay = retry;
            }
        }
    }
    debug!("Reauth thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ParseError;
    use crate::mock::{MockBackend, MockDevice, Traffic};
    use crate::types::{InputReport, Key};
    use std::sync::mpsc;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            discovery_interval: Duration::from_millis(5),
            shutdown_grace: Duration::from_secs(2),
            reader: EventReaderConfig {
                read_timeout_ms: 5,
                error_sleep_ms: 1,
                max_read_errors: 3,
            },
            ..SessionConfig::default()
        }
    }

    fn connect(
        backend: &MockBackend,
    ) -> (Result<Session, TransportError>, mpsc::Receiver<ReaderEvent>) {
        let (tx, rx) = mpsc::channel();
        let session = Session::connect(backend, &fast_config(), &ShutdownSignal::new(), move |e| {
            let _ = tx.send(e);
        });
        (session, rx)
    }

    #[test]
    fn test_reauth_delay() {
        assert_eq!(reauth_delay(30, 10), Some(Duration::from_secs(20)));
        assert_eq!(reauth_delay(11, 10), Some(Duration::from_secs(1)));
        assert_eq!(reauth_delay(10, 10), None);
        assert_eq!(reauth_delay(0, 10), None);
    }

    #[test]
    fn test_handshake_frames() {
        let device = MockDevice::new().with_challenge(0x0123_4567_89ab_cdef);
        let backend = MockBackend::new(device.clone());
        let (session, _rx) = connect(&backend);
        let session = session.unwrap();

        let frames = device.features_sent();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![0x06, 0x00, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(frames[1], vec![0x06, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]);
        let mut expected = vec![0x06, 0x03];
        expected.extend_from_slice(&0xe5c7_b689_e996_7608u64.to_le_bytes());
        assert_eq!(frames[2], expected);
        assert_eq!(device.handshakes(), 1);
        assert!(session.is_connected());
    }

    #[test]
    fn test_phase_mismatch_fails_and_closes_device() {
        let device = MockDevice::new();
        device.fail_phase(Some(auth_phase::DEVICE_RESPONSE));
        let backend = MockBackend::new(device.clone());
        let (session, _rx) = connect(&backend);

        match session {
            Err(TransportError::AuthenticationFailed { phase, .. }) => {
                assert_eq!(phase, "device response")
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("handshake should fail"),
        }
        assert_eq!(device.closes(), 1);
    }

    #[test]
    fn test_status_phase_mismatch() {
        let device = MockDevice::new();
        device.fail_phase(Some(auth_phase::STATUS));
        let (session, _rx) = connect(&MockBackend::new(device));
        assert!(matches!(
            session,
            Err(TransportError::AuthenticationFailed {
                phase: "status",
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_report_does_not_stop_loop() {
        let device = MockDevice::new();
        let backend = MockBackend::new(device.clone());
        let (session, rx) = connect(&backend);
        let _session = session.unwrap();

        device.push_input(&[0x42, 0x01, 0x02]);
        device.push_input(&[0x04, 0x3c, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            first,
            ReaderEvent::DecodeError(ParseError::UnknownReport(0x42))
        );
        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            ReaderEvent::Report(InputReport::Keys(report)) => {
                assert!(report.keys.contains(&Key::STOP_PLAY))
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_repeated_read_errors_disconnect() {
        let device = MockDevice::new();
        let backend = MockBackend::new(device.clone());
        let (session, rx) = connect(&backend);
        let session = session.unwrap();

        device.fail_reads(true);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            ReaderEvent::Disconnected
        );
        assert!(!session.is_connected());
        assert!(matches!(
            session.send_leds(Leds::CUT),
            Err(TransportError::DeviceNotConnected)
        ));
    }

    #[test]
    fn test_writes_and_close() {
        let device = MockDevice::new();
        let backend = MockBackend::new(device.clone());
        let (session, _rx) = connect(&backend);
        let session = session.unwrap();

        session.send_leds(Leds::CAM1).unwrap();
        session.send_jog_leds(JogLeds::JOG).unwrap();
        session.send_jog_mode(JogMode::Relative2).unwrap();
        assert_eq!(
            device.writes(),
            vec![
                vec![0x02, 0x00, 0x40, 0x00, 0x00],
                vec![0x04, 0x01],
                vec![0x03, 0x02, 0, 0, 0, 0, 0xFF],
            ]
        );

        session.close();
        session.close();
        assert_eq!(device.closes(), 1);
        assert!(matches!(
            session.send_leds(Leds::CAM1),
            Err(TransportError::DeviceNotConnected)
        ));
        drop(session);
        assert_eq!(device.closes(), 1);
    }

    #[test]
    fn test_reauth_runs_before_timeout() {
        // timeout 11s with a 10s margin: first reauth after one second
        let device = MockDevice::new().with_timeout(11);
        let backend = MockBackend::new(device.clone());
        let (session, _rx) = connect(&backend);
        let session = session.unwrap();

        let start = Instant::now();
        while device.handshakes() < 2 && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(device.handshakes() >= 2);
        assert!(start.elapsed() >= Duration::from_millis(800));
        session.close();
    }

    #[test]
    fn test_reauth_excludes_concurrent_writes() {
        let device = MockDevice::new().with_timeout(11);
        let backend = MockBackend::new(device.clone());
        let (session, _rx) = connect(&backend);
        let session = session.unwrap();

        let start = Instant::now();
        std::thread::scope(|s| {
            s.spawn(|| {
                while device.handshakes() < 2 && start.elapsed() < Duration::from_secs(5) {
                    session.send_leds(Leds::CUT).unwrap();
                    std::thread::sleep(Duration::from_millis(1));
                }
                for _ in 0..20 {
                    session.send_leds(Leds::CAM1).unwrap();
                }
            });
        });
        assert!(device.handshakes() >= 2);

        let handshake = [
            Traffic::FeatureSent(auth_phase::CHALLENGE),
            Traffic::FeatureRead(auth_phase::CHALLENGE),
            Traffic::FeatureSent(auth_phase::HOST_CHALLENGE),
            Traffic::FeatureRead(auth_phase::DEVICE_RESPONSE),
            Traffic::FeatureSent(auth_phase::HOST_RESPONSE),
            Traffic::FeatureRead(auth_phase::STATUS),
        ];
        let traffic = device.traffic();
        let starts: Vec<usize> = traffic
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == handshake[0])
            .map(|(i, _)| i)
            .collect();
        assert!(starts.len() >= 2);
        for &i in &starts {
            assert_eq!(traffic.get(i..i + handshake.len()), Some(&handshake[..]));
        }

        let is_output = |t: &Traffic| matches!(t, Traffic::Output(_));
        assert!(traffic[..starts[1]].iter().any(is_output));
        assert!(traffic[starts[1]..].iter().any(is_output));
        session.close();
    }

    #[test]
    fn test_no_reauth_for_short_timeout() {
        let device = MockDevice::new().with_timeout(10);
        let backend = MockBackend::new(device.clone());
        let (session, _rx) = connect(&backend);
        let session = session.unwrap();
        assert!(session.reauth_thread.lock().is_none());
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(device.handshakes(), 1);
    }

    #[test]
    fn test_close_cancels_pending_reauth() {
        let device = MockDevice::new().with_timeout(600);
        let backend = MockBackend::new(device.clone());
        let (session, _rx) = connect(&backend);
        let session = session.unwrap();

        let start = Instant::now();
        session.close();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(device.handshakes(), 1);
    }

    #[test]
    fn test_connect_cancelled_while_waiting() {
        let backend = MockBackend::new(MockDevice::new());
        backend.set_present(false);
        let cancel = ShutdownSignal::new();
        cancel.trigger();
        let result = Session::connect(&backend, &fast_config(), &cancel, |_| {});
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }
}
