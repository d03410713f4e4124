//! Beamforming frame to intensity matrix transform.
//!
//! Per frame:
//! 1. raw samples are gain-corrected and calibrated ([`decibel::linear_scale`])
//! 2. converted to decibels ([`decibel::to_decibels`])
//! 3. laid out as a 30x40 grid and resized to the target resolution with a
//!    Lanczos-4 filter, in decibel space
//! 4. windowed against the resized peak ([`window::select_floor`])
//! 5. positive cells normalized into `1..=255`
//!
//! The transform is pure: it reads the parameters once per call and returns
//! a freshly allocated matrix.

pub mod decibel;
pub mod resample;
pub mod window;

use tracing::trace;

use crate::Result;
use crate::types::{Gain, IntensityMatrix, ParamsHandle, RawFrame, TargetSize, VisualizationParams};

/// Transform one frame into a normalized intensity matrix.
pub fn transform(
    raw: &RawFrame,
    gain: Gain,
    params: VisualizationParams,
    target: TargetSize,
) -> Result<IntensityMatrix> {
    target.validate()?;

    let grid = decibel::decibel_grid(raw, gain);
    let mut resized = resample::resize_lanczos4(&grid, target.height, target.width);

    let max_db = resized.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let (floor, rule) = window::select_floor(max_db, params);
    trace!(max_db, floor, ?rule, "Windowing frame");

    window::apply_floor(&mut resized, floor);
    Ok(IntensityMatrix::from_array(window::normalize_positive(&resized)))
}

/// Transform raw samples of unchecked length.
///
/// Returns [`OverlayError::MalformedFrame`](crate::OverlayError::MalformedFrame)
/// unless exactly 1200 samples are supplied.
pub fn transform_samples(
    samples: &[f32],
    gain: Gain,
    params: VisualizationParams,
    target: TargetSize,
) -> Result<IntensityMatrix> {
    let raw = RawFrame::new(samples.to_vec())?;
    transform(&raw, gain, params, target)
}

/// A transform bound to a target resolution and a shared parameter handle.
#[derive(Debug, Clone)]
pub struct FrameTransform {
    target: TargetSize,
    params: ParamsHandle,
}

impl FrameTransform {
    pub fn new(target: TargetSize, params: ParamsHandle) -> Result<Self> {
        target.validate()?;
        Ok(Self { target, params })
    }

    /// Transform one frame using a consistent snapshot of the current parameters.
    pub fn apply(&self, raw: &RawFrame, gain: Gain) -> Result<IntensityMatrix> {
        transform(raw, gain, self.params.snapshot(), self.target)
    }

    pub fn target(&self) -> TargetSize {
        self.target
    }

    pub fn params(&self) -> &ParamsHandle {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OverlayError;
    use crate::types::{FRAME_COLS, FRAME_LEN, FRAME_ROWS};
    use proptest::prelude::*;

    /// Target equal to the source grid, so resizing is an identity.
    fn native() -> TargetSize {
        TargetSize { width: FRAME_COLS, height: FRAME_ROWS }
    }

    fn frame_with(cells: &[((usize, usize), f32)]) -> RawFrame {
        let mut samples = vec![0.0f32; FRAME_LEN];
        for &((r, c), v) in cells {
            samples[r * FRAME_COLS + c] = v;
        }
        RawFrame::new(samples).unwrap()
    }

    #[test]
    fn silence_maps_to_silence() {
        let raw = RawFrame::filled(0.0);
        for target in [native(), TargetSize { width: 160, height: 120 }] {
            let out = transform(&raw, Gain(1), VisualizationParams::default(), target).unwrap();
            assert_eq!((out.rows(), out.cols()), (target.height, target.width));
            assert!(out.is_silent());
        }
    }

    #[test]
    fn single_cell_above_floor_normalizes_to_255() {
        // 1.0 at gain 1 is ~59 dB, well above the 40 dB threshold.
        let raw = frame_with(&[((12, 7), 1.0)]);
        let out = transform(&raw, Gain(1), VisualizationParams::default(), native()).unwrap();

        assert_eq!(out.get(12, 7), Some(255));
        assert_eq!(out.count_nonzero(), 1);
    }

    #[test]
    fn peak_window_discards_quieter_cells() {
        // 10x the intensity is +10 dB; with a 3 dB range only the peak survives.
        let raw = frame_with(&[((0, 0), 1.0), ((5, 5), 10.0)]);
        let out = transform(&raw, Gain(1), VisualizationParams::default(), native()).unwrap();
        assert_eq!(out.get(5, 5), Some(255));
        assert_eq!(out.get(0, 0), Some(0));

        // A wide range keeps both, the quieter one at the bottom of the scale.
        let wide = VisualizationParams::new(40.0, 20.0);
        let out = transform(&raw, Gain(1), wide, native()).unwrap();
        assert_eq!(out.get(5, 5), Some(255));
        assert_eq!(out.get(0, 0), Some(1));
    }

    #[test]
    fn documented_quiet_sample_is_dropped() {
        // 1e-6 at gain 2 is about -7 dB, below the 40 dB default threshold.
        let raw = frame_with(&[((3, 3), 1e-6)]);
        let out = transform(&raw, Gain(2), VisualizationParams::default(), native()).unwrap();
        assert!(out.is_silent());
    }

    #[test]
    fn zero_range_disables_peak_window() {
        let raw = frame_with(&[((0, 0), 1.0), ((5, 5), 10.0)]);
        let params = VisualizationParams::new(40.0, 0.0);
        let out = transform(&raw, Gain(1), params, native()).unwrap();
        assert_eq!(out.count_nonzero(), 2);
    }

    #[test]
    fn output_matches_target_resolution() {
        let raw = frame_with(&[((15, 20), 1.0)]);
        let target = TargetSize { width: 1600, height: 1200 };
        let out = transform(&raw, Gain(1), VisualizationParams::new(40.0, 10.0), target).unwrap();
        assert_eq!((out.rows(), out.cols()), (1200, 1600));
        assert_eq!(out.max(), 255);
    }

    #[test]
    fn malformed_sample_count_is_rejected() {
        let err = transform_samples(&[0.0; 1199], Gain(1), VisualizationParams::default(), native())
            .unwrap_err();
        assert!(matches!(err, OverlayError::MalformedFrame { .. }));
    }

    #[test]
    fn zero_target_is_rejected() {
        let raw = RawFrame::filled(0.0);
        let target = TargetSize { width: 0, height: 10 };
        let err = transform(&raw, Gain(1), VisualizationParams::default(), target).unwrap_err();
        assert!(matches!(err, OverlayError::InvalidTargetSize { .. }));
        assert!(FrameTransform::new(target, ParamsHandle::default()).is_err());
    }

    #[test]
    fn bound_transform_sees_parameter_updates() {
        let params = ParamsHandle::default();
        let transform = FrameTransform::new(native(), params.clone()).unwrap();
        let raw = frame_with(&[((0, 0), 1.0), ((5, 5), 10.0)]);

        assert_eq!(transform.apply(&raw, Gain(1)).unwrap().count_nonzero(), 1);
        params.set_range(20.0);
        assert_eq!(transform.apply(&raw, Gain(1)).unwrap().count_nonzero(), 2);
        params.set_threshold(200.0);
        assert!(transform.apply(&raw, Gain(1)).unwrap().is_silent());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn zero_gain_matches_unity_gain(
            samples in prop::collection::vec(0.0f32..10.0, FRAME_LEN),
            threshold in 0.0f32..80.0,
            range in 0.0f32..30.0,
        ) {
            let raw = RawFrame::new(samples).unwrap();
            let params = VisualizationParams::new(threshold, range);
            let a = transform(&raw, Gain(0), params, native()).unwrap();
            let b = transform(&raw, Gain(1), params, native()).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn huge_range_floor_is_threshold(
            samples in prop::collection::vec(0.0f32..10.0, FRAME_LEN),
            threshold in 20.0f32..70.0,
        ) {
            let raw = RawFrame::new(samples).unwrap();
            let huge = VisualizationParams::new(threshold, 1e6);
            let disabled = VisualizationParams::new(threshold, 0.0);
            // Both paths end at the absolute threshold, so outputs agree.
            let a = transform(&raw, Gain(1), huge, native()).unwrap();
            let b = transform(&raw, Gain(1), disabled, native()).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
