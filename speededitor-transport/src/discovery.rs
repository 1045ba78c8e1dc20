//! Device discovery with retry

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::hid::HidBackend;
use crate::shutdown::ShutdownSignal;
use crate::types::TransportDeviceInfo;

/// Poll the backend until a matching device shows up.
///
/// Enumeration errors are logged and retried like a missing device. Returns
/// `Cancelled` as soon as `cancel` fires.
pub fn wait_for_device(
    backend: &dyn HidBackend,
    vid: u16,
    pid: u16,
    interval: Duration,
    cancel: &ShutdownSignal,
) -> Result<TransportDeviceInfo, TransportError> {
    let mut attempts = 0u64;
    loop {
        if cancel.is_triggered() {
            return Err(TransportError::Cancelled);
        }

        match backend.find_device(vid, pid) {
            Ok(Some(info)) => {
                info!(
                    "Speed Editor found after {} attempt(s): {}",
                    attempts + 1,
                    info.product_name.as_deref().unwrap_or("unknown product")
                );
                return Ok(info);
            }
            Ok(None) => {
                if attempts == 0 {
                    info!("Waiting for device {:04x}:{:04x}...", vid, pid);
                } else {
                    debug!("Device {:04x}:{:04x} not present", vid, pid);
                }
            }
            Err(e) => warn!("Device enumeration failed: {}", e),
        }
        attempts += 1;

        if cancel.wait_timeout(interval) {
            return Err(TransportError::Cancelled);
        }
    }
}
