//! Raw sample to decibel conversion

use ndarray::Array2;

use crate::types::{FRAME_COLS, FRAME_ROWS, Gain, RawFrame};

/// Sensor calibration constant applied after gain correction.
pub const CALIBRATION: f64 = 0.00031921;

/// Reference level for the decibel scale.
pub const REFERENCE: f64 = 4e-10;

/// Remove the quadratic gain dependence of the analog front end and apply
/// the calibration constant.
pub fn linear_scale(sample: f32, gain: Gain) -> f64 {
    sample as f64 / gain.squared() * CALIBRATION
}

/// Convert a linear intensity to decibels relative to [`REFERENCE`].
///
/// Non-positive and non-finite inputs map to the 0 dB "no signal" floor.
pub fn to_decibels(scaled: f64) -> f64 {
    if !scaled.is_finite() || scaled <= 0.0 {
        return 0.0;
    }
    10.0 * (scaled / REFERENCE).log10()
}

/// Convert a whole frame into a 30x40 decibel grid, preserving row-major order.
pub fn decibel_grid(raw: &RawFrame, gain: Gain) -> Array2<f32> {
    let values = raw.samples().iter().map(|&x| to_decibels(linear_scale(x, gain)) as f32);
    Array2::from_shape_vec((FRAME_ROWS, FRAME_COLS), values.collect())
        .unwrap_or_else(|_| Array2::zeros((FRAME_ROWS, FRAME_COLS)))
}
