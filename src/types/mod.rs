//! Core types for beamforming frames and their rendered output.
//!
//! ## Architecture
//!
//! - [`RawFrame`] is one 30x40 grid of raw intensity samples, length-checked on construction
//! - [`Gain`] is the microphone gain reported with each frame (zero acts as one)
//! - [`VisualizationParams`] and [`ParamsHandle`] hold the windowing tunables
//! - [`IntensityMatrix`] is the 8-bit output grid at the renderer's resolution
//! - [`SessionState`] tracks the streaming session lifecycle
//!
//! ## Usage Example
//!
//! ```rust
//! use acoustic_overlay::types::{RawFrame, Gain, FRAME_LEN};
//!
//! let frame = RawFrame::new(vec![0.0; FRAME_LEN]).unwrap();
//! assert_eq!(frame.samples().len(), 1200);
//! assert_eq!(Gain(0).effective(), 1);
//!
//! assert!(RawFrame::new(vec![0.0; 1199]).is_err());
//! ```

mod frame;
mod matrix;
mod params;
mod state;
mod update_rate;

pub use frame::{FRAME_COLS, FRAME_LEN, FRAME_ROWS, Gain, RawFrame};
pub use matrix::{IntensityFrame, IntensityMatrix, TargetSize};
pub use params::{ParamsHandle, VisualizationParams};
pub use state::SessionState;
pub use update_rate::UpdateRate;
