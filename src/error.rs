//! Error types for frame decoding, transformation and session handling.
//!
//! All errors implement the `std::error::Error` trait and include structured
//! context for logging and recovery guidance.
//!
//! ## Error Categories
//!
//! - **Frame Errors**: Malformed inbound frames (wrong sample count, missing fields)
//! - **Link Errors**: Transport failures on a live connection
//! - **Connect Failures**: A connection attempt that never reached the device
//! - **Configuration Errors**: Invalid or unreadable session configuration
//! - **Task Errors**: A session background task panicked or was aborted
//!
//! No error in this crate is fatal to the streaming session. Frame errors stay
//! local to a single frame, link errors stay local to the session and show up
//! as reconnect cycling in the logs.
//!
//! ```rust
//! use acoustic_overlay::OverlayError;
//!
//! let error = OverlayError::sample_count(1199);
//! assert!(!error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for overlay operations.
pub type Result<T, E = OverlayError> = std::result::Result<T, E>;

/// Main error type for overlay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OverlayError {
    #[error("Malformed frame: {details}")]
    MalformedFrame { details: String },

    #[error("Link error: {reason}")]
    Link {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Link closed: {reason}")]
    LinkClosed { reason: String },

    #[error("Failed to connect to {endpoint}")]
    ConnectFailure {
        endpoint: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Configuration file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {context}")]
    Encode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid target size {width}x{height}")]
    InvalidTargetSize { width: usize, height: usize },

    #[error("Background task '{task}' failed")]
    Task {
        task: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl OverlayError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            OverlayError::Link { .. } => true,
            OverlayError::LinkClosed { .. } => true,
            OverlayError::ConnectFailure { .. } => true,
            OverlayError::MalformedFrame { .. } => false,
            OverlayError::Config { .. } => false,
            OverlayError::File { .. } => false,
            OverlayError::Encode { .. } => false,
            OverlayError::InvalidTargetSize { .. } => false,
            OverlayError::Task { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            OverlayError::MalformedFrame { .. } => vec![
                "Check the device firmware sends 30x40 beamforming frames",
                "Verify the subscribed event id produces beamforming data",
                "Inspect the raw message in debug logs",
            ],
            OverlayError::Link { .. } => vec![
                "Check network connectivity to the device",
                "Wait for the session to reconnect",
            ],
            OverlayError::LinkClosed { .. } => vec![
                "Wait for the session to reconnect",
                "Check whether the device rebooted",
            ],
            OverlayError::ConnectFailure { .. } => vec![
                "Verify the device address and port",
                "Check the username and password",
                "Make sure the device is powered and reachable",
                "Enable reconnect backoff if the link flaps",
            ],
            OverlayError::Config { .. } => vec![
                "Check the configuration values against the documented defaults",
                "Make sure the device address is set",
            ],
            OverlayError::File { .. } => vec![
                "Check the configuration file exists and is readable",
                "Check file permissions",
            ],
            OverlayError::Encode { .. } => vec!["Check the outbound message contents"],
            OverlayError::InvalidTargetSize { .. } => {
                vec!["Use a target resolution with non-zero width and height"]
            }
            OverlayError::Task { .. } => vec![
                "Check the logs for a panic inside the session",
                "Start a new session",
            ],
        }
    }

    /// Helper constructor for malformed frame errors.
    pub fn malformed_frame(details: impl Into<String>) -> Self {
        OverlayError::MalformedFrame { details: details.into() }
    }

    /// Helper constructor for frames with the wrong number of samples.
    pub fn sample_count(actual: usize) -> Self {
        OverlayError::MalformedFrame {
            details: format!(
                "expected {} samples, found {}",
                crate::types::FRAME_LEN,
                actual
            ),
        }
    }

    /// Helper constructor for link errors.
    pub fn link_failed(reason: impl Into<String>) -> Self {
        OverlayError::Link { reason: reason.into(), source: None }
    }

    /// Helper constructor for link errors with source.
    pub fn link_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        OverlayError::Link { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for link close notifications.
    pub fn link_closed(reason: impl Into<String>) -> Self {
        OverlayError::LinkClosed { reason: reason.into() }
    }

    /// Helper constructor for connect failures.
    pub fn connect_failed(endpoint: impl Into<String>) -> Self {
        OverlayError::ConnectFailure { endpoint: endpoint.into(), source: None }
    }

    /// Helper constructor for connect failures with source.
    pub fn connect_failed_with_source(
        endpoint: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        OverlayError::ConnectFailure { endpoint: endpoint.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(details: impl Into<String>) -> Self {
        OverlayError::Config { details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        OverlayError::File { path, source }
    }
}

// Inbound JSON that fails to deserialize is a malformed frame, never a crash.
impl From<serde_json::Error> for OverlayError {
    fn from(err: serde_json::Error) -> Self {
        OverlayError::MalformedFrame { details: err.to_string() }
    }
}

impl From<serde_yaml_ng::Error> for OverlayError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        OverlayError::Config { details: err.to_string() }
    }
}
