//! HID capability traits and the hidapi-backed implementation
//!
//! The session only talks to the device through [`HidStream`], so the same
//! handshake and poll code runs against real hardware and the in-memory mock.

use hidapi::{HidApi, HidDevice};
use tracing::debug;

use crate::error::TransportError;
use crate::types::TransportDeviceInfo;

/// An open HID handle. Dropping it closes the device.
pub trait HidStream: Send {
    /// Read one input report, waiting at most `timeout_ms`.
    ///
    /// Returns `Ok(0)` on timeout.
    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError>;

    /// Write an output report (byte 0 is the report ID)
    fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// GET_FEATURE; `buf[0]` must hold the report ID on entry
    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// SET_FEATURE; byte 0 is the report ID
    fn send_feature_report(&self, data: &[u8]) -> Result<(), TransportError>;
}

/// Locates and opens devices
pub trait HidBackend: Send + Sync {
    /// Look for a device with the given identifiers
    fn find_device(&self, vid: u16, pid: u16)
        -> Result<Option<TransportDeviceInfo>, TransportError>;

    /// Open a previously found device
    fn open(&self, info: &TransportDeviceInfo) -> Result<Box<dyn HidStream>, TransportError>;
}

impl HidStream for HidDevice {
    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        Ok(HidDevice::read_timeout(self, buf, timeout_ms)?)
    }

    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(HidDevice::write(self, data)?)
    }

    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(HidDevice::get_feature_report(self, buf)?)
    }

    fn send_feature_report(&self, data: &[u8]) -> Result<(), TransportError> {
        Ok(HidDevice::send_feature_report(self, data)?)
    }
}

/// Backend over the system HID stack via `hidapi`
#[derive(Debug, Default, Clone, Copy)]
pub struct HidApiBackend;

impl HidApiBackend {
    pub fn new() -> Self {
        Self
    }

    /// Fresh context so each discovery attempt sees hotplugged devices
    fn api() -> Result<HidApi, TransportError> {
        HidApi::new().map_err(|e| TransportError::HidError(e.to_string()))
    }
}

impl HidBackend for HidApiBackend {
    fn find_device(
        &self,
        vid: u16,
        pid: u16,
    ) -> Result<Option<TransportDeviceInfo>, TransportError> {
        let api = Self::api()?;
        let found = api
            .device_list()
            .find(|d| d.vendor_id() == vid && d.product_id() == pid)
            .map(|d| TransportDeviceInfo {
                vid: d.vendor_id(),
                pid: d.product_id(),
                device_path: d.path().to_string_lossy().into_owned(),
                serial: d.serial_number().map(str::to_owned),
                product_name: d.product_string().map(str::to_owned),
            });

        if let Some(info) = &found {
            debug!(
                "Found {:04x}:{:04x} at {}",
                info.vid, info.pid, info.device_path
            );
        }
        Ok(found)
    }

    fn open(&self, info: &TransportDeviceInfo) -> Result<Box<dyn HidStream>, TransportError> {
        let api = Self::api()?;
        let path = std::ffi::CString::new(info.device_path.as_bytes())
            .map_err(|e| TransportError::Internal(format!("invalid device path: {e}")))?;
        let device = api.open_path(&path)?;
        Ok(Box::new(device))
    }
}
