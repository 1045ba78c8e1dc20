//! Transport error types

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Output or control attempted while no HID handle is open
    #[error("Device not connected")]
    DeviceNotConnected,

    /// A handshake frame carried the wrong phase byte, or the exchange failed
    #[error("Authentication failed at {phase}: {reason}")]
    AuthenticationFailed { phase: &'static str, reason: String },

    // HID-specific errors
    #[error("HID error: {0}")]
    HidError(String),

    #[error("HID permission denied: {0}")]
    HidPermissionDenied(String),

    /// The caller's cancellation signal fired while waiting
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    pub(crate) fn auth(phase: &'static str, reason: impl Into<String>) -> Self {
        TransportError::AuthenticationFailed {
            phase,
            reason: reason.into(),
        }
    }
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            TransportError::HidPermissionDenied(msg)
        } else {
            TransportError::HidError(msg)
        }
    }
}
