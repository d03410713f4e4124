//! Session configuration.
//!
//! Everything the owning process supplies to a session: where the device is,
//! how to authenticate, which event to subscribe to, the output resolution and
//! the initial windowing parameters. Configurations are usually loaded from
//! YAML:
//!
//! ```rust
//! use acoustic_overlay::SessionConfig;
//!
//! let config = SessionConfig::from_yaml(
//!     r#"
//! device:
//!   address: 10.1.5.33
//! credentials:
//!   username: admin
//!   password: admin
//! target:
//!   width: 1600
//!   height: 1200
//! "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.endpoint(), "ws://10.1.5.33:80/ws");
//! assert_eq!(config.visualization.threshold_db, 40.0);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{TargetSize, VisualizationParams};
use crate::{OverlayError, Result};

/// Where the device listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Host name or IP address.
    pub address: String,
    pub port: u16,
    /// WebSocket path on the device.
    pub path: String,
    /// WebSocket sub-protocol requested during the handshake.
    pub protocol: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            port: 80,
            path: "/ws".to_string(),
            protocol: Some("subscribe".to_string()),
        }
    }
}

/// Opaque login supplied by the caller.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What to do between a link close and the next connect attempt.
///
/// `Immediate` reconnects without any delay and without an attempt limit.
/// Under sustained network flapping this cycles as fast as the transport
/// fails; `Backoff` is the opt-in alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectPolicy {
    #[default]
    Immediate,
    /// Exponential delay starting at `initial_ms`, doubling per consecutive
    /// failure, capped at `max_ms`.
    Backoff { initial_ms: u64, max_ms: u64 },
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based count of
    /// consecutive failures), or `None` to reconnect right away.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            ReconnectPolicy::Immediate => None,
            ReconnectPolicy::Backoff { initial_ms, max_ms } => {
                let exponent = attempt.saturating_sub(1).min(16);
                let ms = initial_ms.saturating_mul(1u64 << exponent).min(max_ms);
                Some(Duration::from_millis(ms))
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if let ReconnectPolicy::Backoff { initial_ms, max_ms } = *self {
            if initial_ms == 0 {
                return Err(OverlayError::config_error("reconnect backoff initial_ms must be > 0"));
            }
            if initial_ms > max_ms {
                return Err(OverlayError::config_error(format!(
                    "reconnect backoff initial_ms ({initial_ms}) exceeds max_ms ({max_ms})"
                )));
            }
        }
        Ok(())
    }
}

/// Complete configuration of one streaming session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub device: DeviceConfig,
    pub credentials: Credentials,
    /// Device event to subscribe to.
    pub event_id: i32,
    /// Output resolution of every intensity matrix.
    pub target: TargetSize,
    /// Initial windowing parameters; adjustable at runtime through
    /// [`StreamSession::params`](crate::StreamSession::params).
    pub visualization: VisualizationParams,
    /// Transforms allowed to run concurrently.
    pub workers: usize,
    /// Parsed frames buffered between the link and the workers. Frames
    /// arriving while the buffer is full are dropped.
    pub queue_capacity: usize,
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            credentials: Credentials::default(),
            event_id: 0,
            target: TargetSize::default(),
            visualization: VisualizationParams::default(),
            workers: 2,
            queue_capacity: 32,
            reconnect: ReconnectPolicy::Immediate,
        }
    }
}

impl SessionConfig {
    /// Configuration for `address` with every other value defaulted.
    pub fn new(address: impl Into<String>, credentials: Credentials, event_id: i32) -> Self {
        Self {
            device: DeviceConfig { address: address.into(), ..DeviceConfig::default() },
            credentials,
            event_id,
            ..Self::default()
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: SessionConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|source| OverlayError::file_error(path.to_path_buf(), source))?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.address.trim().is_empty() {
            return Err(OverlayError::config_error("device address must be set"));
        }
        if !self.device.path.starts_with('/') {
            return Err(OverlayError::config_error(format!(
                "device path '{}' must start with '/'",
                self.device.path
            )));
        }
        self.validate_pipeline()
    }

    /// Checks that apply regardless of which transport carries the frames.
    pub(crate) fn validate_pipeline(&self) -> Result<()> {
        self.target.validate()?;
        if self.workers == 0 {
            return Err(OverlayError::config_error("workers must be > 0"));
        }
        if self.queue_capacity == 0 {
            return Err(OverlayError::config_error("queue_capacity must be > 0"));
        }
        self.reconnect.validate()
    }

    /// WebSocket URL of the device.
    pub fn endpoint(&self) -> String {
        format!("ws://{}:{}{}", self.device.address, self.device.port, self.device.path)
    }
}
