//! Editor-level error types

use speededitor_transport::TransportError;
use thiserror::Error;

/// Errors from Speed Editor operations
#[derive(Error, Debug)]
pub enum EditorError {
    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Argument outside the accepted range; nothing was sent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Already connected")]
    AlreadyConnected,

    /// Config file could not be read, parsed or written
    #[error("Config error: {0}")]
    Config(String),
}

impl EditorError {
    /// The device was unplugged or never opened
    pub fn is_not_connected(&self) -> bool {
        matches!(
            self,
            EditorError::Transport(TransportError::DeviceNotConnected)
        )
    }
}

/// Result alias for editor operations
pub type Result<T> = std::result::Result<T, EditorError>;
