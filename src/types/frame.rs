//! Raw beamforming frame types

use std::sync::Arc;

use crate::{OverlayError, Result};

/// Rows in one beamforming frame.
pub const FRAME_ROWS: usize = 30;

/// Columns in one beamforming frame.
pub const FRAME_COLS: usize = 40;

/// Samples in one beamforming frame (rows x columns, row-major).
pub const FRAME_LEN: usize = FRAME_ROWS * FRAME_COLS;

/// One beamforming snapshot: exactly [`FRAME_LEN`] intensity samples laid out
/// as a 30x40 row-major grid.
///
/// The length invariant is checked on construction, so anything holding a
/// `RawFrame` can index the full grid without bounds surprises.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    samples: Arc<[f32]>,
}

impl RawFrame {
    /// Create a frame from raw samples, rejecting any length other than
    /// [`FRAME_LEN`] with [`OverlayError::MalformedFrame`].
    pub fn new(samples: Vec<f32>) -> Result<Self> {
        if samples.len() != FRAME_LEN {
            return Err(OverlayError::sample_count(samples.len()));
        }
        Ok(Self { samples: samples.into() })
    }

    /// Create a frame with every sample set to `value`.
    pub fn filled(value: f32) -> Self {
        Self { samples: vec![value; FRAME_LEN].into() }
    }

    /// Samples in row-major order.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample at `(row, col)`, or `None` outside the 30x40 grid.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= FRAME_ROWS || col >= FRAME_COLS {
            return None;
        }
        self.samples.get(row * FRAME_COLS + col).copied()
    }
}

impl TryFrom<Vec<f32>> for RawFrame {
    type Error = OverlayError;

    fn try_from(samples: Vec<f32>) -> Result<Self> {
        Self::new(samples)
    }
}

/// Microphone gain reported alongside each frame.
///
/// A gain of zero is treated as a gain of one rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gain(pub i32);

impl Gain {
    /// The gain actually used for correction.
    pub fn effective(self) -> i32 {
        if self.0 == 0 { 1 } else { self.0 }
    }

    /// Squared effective gain, computed in floating point so it cannot overflow.
    pub fn squared(self) -> f64 {
        let g = self.effective() as f64;
        g * g
    }
}

impl From<i32> for Gain {
    fn from(value: i32) -> Self {
        Gain(value)
    }
}
