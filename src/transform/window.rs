//! Dynamic windowing and masked normalization

use ndarray::Array2;

use crate::types::VisualizationParams;

/// Which rule picked the active floor for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorRule {
    /// Range is numerically zero; the absolute threshold applies.
    RangeDisabled,
    /// Normal case: keep the top `range_db` below the frame peak.
    PeakWindow,
    /// The peak window fell below the absolute threshold.
    Threshold,
}

/// Whether `range_db` counts as zero.
///
/// Evaluates `|r| * 1e5 <= min(|r + 1|, 1)` verbatim. The test is not
/// symmetric around zero: `5e-6` and `-5e-6` qualify, but close to the
/// boundary the negative side gives out first.
pub fn range_is_negligible(range_db: f32) -> bool {
    let r = range_db as f64;
    r.abs() * 100_000.0 <= (r + 1.0).abs().min(1.0)
}

/// Pick the floor below which cells are zeroed, given the frame peak.
pub fn select_floor(max_db: f32, params: VisualizationParams) -> (f32, FloorRule) {
    let lower = params.threshold_db;
    let upper = max_db - params.range_db;

    if range_is_negligible(params.range_db) {
        (lower, FloorRule::RangeDisabled)
    } else if upper > lower {
        (upper, FloorRule::PeakWindow)
    } else {
        (lower, FloorRule::Threshold)
    }
}

/// Zero every cell below `floor`; cells at or above it are kept unchanged.
pub fn apply_floor(grid: &mut Array2<f32>, floor: f32) {
    grid.mapv_inplace(|v| if v >= floor { v } else { 0.0 });
}

/// Rescale strictly-positive cells linearly into `1..=255` and quantize.
///
/// Cells at or below zero become 0 ("no signal"). When every positive cell
/// holds the same value, they all map to 255.
pub fn normalize_positive(grid: &Array2<f32>) -> Array2<u8> {
    let (min, max) = grid
        .iter()
        .filter(|&&v| v > 0.0)
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if min > max {
        return Array2::zeros(grid.dim());
    }

    let span = (max - min) as f64;
    if span <= f64::from(f32::EPSILON) * (max as f64).abs().max(1.0) {
        return grid.mapv(|v| if v > 0.0 { 255 } else { 0 });
    }

    let scale = 254.0 / span;
    grid.mapv(|v| {
        if v > 0.0 {
            let level = 1.0 + (v as f64 - min as f64) * scale;
            level.round().clamp(1.0, 255.0) as u8
        } else {
            0
        }
    })
}
