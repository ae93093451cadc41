//! # Error Types
//!
//! Custom error types for FPV Vision Router using `thiserror`.

use std::time::Duration;
use thiserror::Error;

/// Main error type for FPV Vision Router
#[derive(Debug, Error)]
pub enum RouterError {
    /// Event codec errors (bad UTF-8, unknown event type, ...)
    #[error("Event codec error: {0}")]
    Codec(String),

    /// Malformed JSON event record
    #[error("Malformed event record: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output sink could not be opened or written
    #[error("Output sink error: {0}")]
    OutputSink(String),

    /// A send to the output sink did not complete in time
    #[error("Send timed out after {0:?}")]
    SendTimeout(Duration),

    /// Input device errors
    #[error("Input device error: {0}")]
    Device(String),

    /// No joystick found on the system
    #[error("No joystick device found")]
    DeviceNotFound,

    /// Physical source stopped producing samples
    #[error("Physical input lost (last sample age: {0:?})")]
    PhysicalInputLost(Option<Duration>),
}

/// Result type alias for FPV Vision Router
pub type Result<T> = std::result::Result<T, RouterError>;
