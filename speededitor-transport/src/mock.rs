//! In-memory Speed Editor for tests
//!
//! Emulates the device side of the authentication exchange, queues input
//! reports for the poll loop and records every frame the host sends.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::auth::compute_response;
use crate::device_registry::{PRODUCT_ID, VENDOR_ID};
use crate::error::TransportError;
use crate::hid::{HidBackend, HidStream};
use crate::protocol::{auth_phase, AUTH_REPORT_ID};
use crate::types::TransportDeviceInfo;

/// Longest a mock read blocks when no input is queued
const MAX_IDLE_READ_MS: u64 = 2;

/// One host exchange, in the order the device saw it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traffic {
    /// Auth feature report sent by the host, by phase byte
    FeatureSent(u8),
    /// Auth feature report read by the host, by the phase it carried
    FeatureRead(u8),
    /// Output report, by report ID
    Output(u8),
}

#[derive(Debug)]
struct MockState {
    challenge: u64,
    timeout_secs: u16,
    /// Phase code the next GET_FEATURE answers with
    pending: u8,
    /// Answer this phase with a wrong phase byte
    fail_phase: Option<u8>,
    response_ok: bool,
    fail_reads: bool,
    fail_writes: bool,
    handshakes: u32,
    traffic: Vec<Traffic>,
    features: Vec<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    input: VecDeque<Vec<u8>>,
}

/// Handle to the emulated device. Clones share state.
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
    closes: Arc<AtomicU32>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                challenge: 0x1122_3344_5566_7788,
                timeout_secs: 600,
                pending: auth_phase::CHALLENGE,
                fail_phase: None,
                response_ok: false,
                fail_reads: false,
                fail_writes: false,
                handshakes: 0,
                traffic: Vec::new(),
                features: Vec::new(),
                writes: Vec::new(),
                input: VecDeque::new(),
            })),
            closes: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Challenge handed out in phase 0
    pub fn with_challenge(self, challenge: u64) -> Self {
        self.state.lock().challenge = challenge;
        self
    }

    /// Reauth timeout reported in the status frame
    pub fn with_timeout(self, timeout_secs: u16) -> Self {
        self.state.lock().timeout_secs = timeout_secs;
        self
    }

    /// Make the device answer `phase` with a mismatched phase byte
    pub fn fail_phase(&self, phase: Option<u8>) {
        self.state.lock().fail_phase = phase;
    }

    /// Make every input read fail
    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Make every output report write fail
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Queue a raw input report for the poll loop
    pub fn push_input(&self, report: &[u8]) {
        self.state.lock().input.push_back(report.to_vec());
    }

    /// Completed handshakes with a correct host response
    pub fn handshakes(&self) -> u32 {
        self.state.lock().handshakes
    }

    /// Feature reports sent by the host
    pub fn features_sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().features.clone()
    }

    /// Output reports written by the host
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    /// Every feature exchange and output write, interleaved
    pub fn traffic(&self) -> Vec<Traffic> {
        self.state.lock().traffic.clone()
    }

    /// Number of streams that have been dropped
    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    fn open_stream(&self) -> MockStream {
        MockStream {
            device: self.clone(),
        }
    }
}

/// Open handle on a [`MockDevice`]
#[derive(Debug)]
pub struct MockStream {
    device: MockDevice,
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.device.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl HidStream for MockStream {
    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        let next = {
            let mut state = self.device.state.lock();
            if state.fail_reads {
                return Err(TransportError::HidError("mock read failure".into()));
            }
            state.input.pop_front()
        };

        match next {
            Some(report) => {
                let len = report.len().min(buf.len());
                buf[..len].copy_from_slice(&report[..len]);
                Ok(len)
            }
            None => {
                let idle = u64::try_from(timeout_ms).unwrap_or(0).min(MAX_IDLE_READ_MS);
                std::thread::sleep(Duration::from_millis(idle));
                Ok(0)
            }
        }
    }

    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.device.state.lock();
        if state.fail_writes {
            return Err(TransportError::HidError("mock write failure".into()));
        }
        state
            .traffic
            .push(Traffic::Output(data.first().copied().unwrap_or(0)));
        state.writes.push(data.to_vec());
        Ok(data.len())
    }

    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.device.state.lock();
        if buf.first() != Some(&AUTH_REPORT_ID) {
            return Err(TransportError::HidError("unsupported feature report".into()));
        }

        let phase = state.pending;
        let payload = match phase {
            auth_phase::CHALLENGE => state.challenge,
            auth_phase::STATUS => u64::from(state.timeout_secs),
            _ => 0,
        };
        if phase == auth_phase::STATUS && state.response_ok {
            state.handshakes += 1;
        }

        let mut frame = [0u8; 10];
        frame[0] = AUTH_REPORT_ID;
        frame[1] = match state.fail_phase {
            Some(p) if p == phase => phase.wrapping_add(0x10),
            _ => phase,
        };
        frame[2..].copy_from_slice(&payload.to_le_bytes());
        state.traffic.push(Traffic::FeatureRead(frame[1]));

        let len = frame.len().min(buf.len());
        buf[..len].copy_from_slice(&frame[..len]);
        Ok(len)
    }

    fn send_feature_report(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.device.state.lock();
        state.features.push(data.to_vec());
        if let Some(&phase) = data.get(1) {
            state.traffic.push(Traffic::FeatureSent(phase));
        }

        match data.get(1).copied() {
            Some(auth_phase::CHALLENGE) => {
                state.response_ok = false;
                state.pending = auth_phase::CHALLENGE;
            }
            Some(auth_phase::HOST_CHALLENGE) => state.pending = auth_phase::DEVICE_RESPONSE,
            Some(auth_phase::HOST_RESPONSE) if data.len() >= 10 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&data[2..10]);
                state.response_ok = u64::from_le_bytes(raw) == compute_response(state.challenge);
                // A wrong answer leaves the device in the challenge phase
                state.pending = if state.response_ok {
                    auth_phase::STATUS
                } else {
                    auth_phase::CHALLENGE
                };
            }
            _ => return Err(TransportError::HidError("unexpected feature report".into())),
        }
        Ok(())
    }
}

/// Backend that "finds" a single [`MockDevice`]
#[derive(Debug, Clone)]
pub struct MockBackend {
    device: MockDevice,
    present: Arc<AtomicBool>,
    find_attempts: Arc<AtomicU32>,
}

impl MockBackend {
    pub fn new(device: MockDevice) -> Self {
        Self {
            device,
            present: Arc::new(AtomicBool::new(true)),
            find_attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Simulate plugging or unplugging the device
    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    pub fn find_attempts(&self) -> u32 {
        self.find_attempts.load(Ordering::SeqCst)
    }
}

impl HidBackend for MockBackend {
    fn find_device(
        &self,
        vid: u16,
        pid: u16,
    ) -> Result<Option<TransportDeviceInfo>, TransportError> {
        self.find_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.present.load(Ordering::SeqCst) || vid != VENDOR_ID || pid != PRODUCT_ID {
            return Ok(None);
        }
        Ok(Some(TransportDeviceInfo {
            vid,
            pid,
            device_path: "mock://speed-editor".into(),
            serial: Some("MOCK0001".into()),
            product_name: Some("DaVinci Resolve Speed Editor".into()),
        }))
    }

    fn open(&self, _info: &TransportDeviceInfo) -> Result<Box<dyn HidStream>, TransportError> {
        if !self.present.load(Ordering::SeqCst) {
            return Err(TransportError::DeviceNotFound("mock device unplugged".into()));
        }
        Ok(Box::new(self.device.open_stream()))
    }
}
