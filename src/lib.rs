//! Acoustic camera overlay pipeline.
//!
//! Turns the beamforming stream of an acoustic camera into 8-bit intensity
//! matrices ready to be color-mapped over a video frame.
//!
//! # Features
//!
//! - **Frame transform**: raw 30x40 samples to decibels, Lanczos-4 resize to
//!   any resolution, dynamic windowing and masked normalization
//! - **Streaming session**: WebSocket connect, subscribe and reconnect with
//!   transforms running on a bounded worker pool
//! - **Runtime tuning**: threshold and range adjustable while streaming
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use acoustic_overlay::{Credentials, SessionConfig, StreamSession, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new("10.1.5.33", Credentials::new("admin", "admin"), 0);
//!     let session = StreamSession::start(&config)?;
//!     let mut frames = session.subscribe(UpdateRate::Max(30));
//!
//!     while let Some(frame) = frames.next().await {
//!         println!("frame {} peak {}", frame.sequence, frame.matrix.max());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The transform can also be used on its own:
//!
//! ```rust
//! use acoustic_overlay::{Gain, RawFrame, TargetSize, VisualizationParams, transform};
//!
//! let mut samples = vec![0.0; 1200];
//! samples[615] = 1.0;
//! let raw = RawFrame::new(samples).unwrap();
//!
//! let target = TargetSize::new(160, 120).unwrap();
//! let matrix = transform(&raw, Gain(1), VisualizationParams::default(), target).unwrap();
//! assert_eq!((matrix.rows(), matrix.cols()), (120, 160));
//! assert_eq!(matrix.max(), 255);
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod protocol;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Frame pipeline
pub mod transform;

// Streaming
pub mod session;
pub mod stream;
pub mod transport;
pub mod transports;

// Core exports
pub use error::*;
pub use types::*;

pub use config::{Credentials, DeviceConfig, ReconnectPolicy, SessionConfig};
pub use session::{SessionStats, StreamSession};
pub use transform::{FrameTransform, transform};
pub use transport::{LinkEvent, Transport};
pub use transports::WebSocketTransport;
