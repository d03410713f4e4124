//! Separable Lanczos-4 resampling of decibel grids.
//!
//! Matches the usual image-library convention: pixel centres sit at half
//! integer coordinates, each output sample draws on 8 source taps, borders
//! are replicated and the tap weights are normalized to sum to one. Resizing
//! to the source size is an exact identity.

use std::f64::consts::PI;

use ndarray::Array2;

const TAPS: usize = 8;
const HALF: isize = 3;

/// Source indices and weights contributing to one output coordinate.
#[derive(Debug, Clone, Copy)]
struct Kernel {
    index: [usize; TAPS],
    weight: [f32; TAPS],
}

fn lanczos4(distance: f64) -> f64 {
    if distance.abs() < f64::EPSILON {
        return 1.0;
    }
    if distance.abs() >= 4.0 {
        return 0.0;
    }
    let x = PI * distance;
    4.0 * x.sin() * (x / 4.0).sin() / (x * x)
}

/// Precompute one kernel per output coordinate along an axis.
fn kernels(src_len: usize, dst_len: usize) -> Vec<Kernel> {
    let scale = src_len as f64 / dst_len as f64;
    let last = src_len.saturating_sub(1) as isize;

    (0..dst_len)
        .map(|d| {
            let center = (d as f64 + 0.5) * scale - 0.5;
            let base = center.floor();
            let frac = center - base;
            let base = base as isize;

            let mut index = [0usize; TAPS];
            let mut raw = [0f64; TAPS];
            if frac < f64::from(f32::EPSILON) {
                // Exactly on a source sample: only the centre tap contributes.
                raw[HALF as usize] = 1.0;
            } else {
                for (i, w) in raw.iter_mut().enumerate() {
                    *w = lanczos4(frac + HALF as f64 - i as f64);
                }
            }
            for (i, slot) in index.iter_mut().enumerate() {
                *slot = (base - HALF + i as isize).clamp(0, last) as usize;
            }

            let sum: f64 = raw.iter().sum();
            let mut weight = [0f32; TAPS];
            for (w, r) in weight.iter_mut().zip(raw) {
                *w = (r / sum) as f32;
            }
            Kernel { index, weight }
        })
        .collect()
}

/// Resize `src` to `rows x cols` with a Lanczos-4 filter.
pub fn resize_lanczos4(src: &Array2<f32>, rows: usize, cols: usize) -> Array2<f32> {
    let (src_rows, src_cols) = src.dim();
    if src_rows == 0 || src_cols == 0 || rows == 0 || cols == 0 {
        return Array2::zeros((rows, cols));
    }

    // Horizontal pass: src_rows x cols
    let horizontal = kernels(src_cols, cols);
    let mut wide = Array2::<f32>::zeros((src_rows, cols));
    for r in 0..src_rows {
        let row = src.row(r);
        for (c, k) in horizontal.iter().enumerate() {
            let mut acc = 0f32;
            for t in 0..TAPS {
                acc += row[k.index[t]] * k.weight[t];
            }
            wide[(r, c)] = acc;
        }
    }

    // Vertical pass: rows x cols
    let vertical = kernels(src_rows, rows);
    let mut out = Array2::<f32>::zeros((rows, cols));
    for (r, k) in vertical.iter().enumerate() {
        let mut out_row = out.row_mut(r);
        for t in 0..TAPS {
            let weight = k.weight[t];
            if weight == 0.0 {
                continue;
            }
            out_row.scaled_add(weight, &wide.row(k.index[t]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize) -> Array2<f32> {
        Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c) as f32)
    }

    #[test]
    fn same_size_is_identity() {
        let src = ramp(30, 40);
        let out = resize_lanczos4(&src, 30, 40);
        assert_eq!(out, src);
    }

    #[test]
    fn constant_grid_stays_constant() {
        let src = Array2::from_elem((30, 40), 42.5f32);
        let out = resize_lanczos4(&src, 120, 160);
        assert_eq!(out.dim(), (120, 160));
        for &v in out.iter() {
            assert!((v - 42.5).abs() < 1e-3, "got {v}");
        }
    }

    #[test]
    fn weights_sum_to_one() {
        for (src, dst) in [(40, 1600), (30, 1200), (40, 17), (30, 30)] {
            for k in kernels(src, dst) {
                let sum: f32 = k.weight.iter().sum();
                assert!((sum - 1.0).abs() < 1e-5);
                assert!(k.index.iter().all(|&i| i < src));
            }
        }
    }

    #[test]
    fn upscaling_preserves_linear_ramps_in_the_interior() {
        let src = Array2::from_shape_fn((30, 40), |(_, c)| c as f32);
        let out = resize_lanczos4(&src, 30, 80);
        // Output column 41 sits at source coordinate 20.25.
        assert!((out[(10, 41)] - 20.25).abs() < 0.05, "got {}", out[(10, 41)]);
    }

    #[test]
    fn single_peak_spreads_around_its_location() {
        let mut src = Array2::<f32>::zeros((30, 40));
        src[(15, 20)] = 100.0;
        let out = resize_lanczos4(&src, 120, 160);

        let (mut best, mut at) = (f32::MIN, (0, 0));
        for ((r, c), &v) in out.indexed_iter() {
            if v > best {
                best = v;
                at = (r, c);
            }
        }
        // Source cell (15, 20) covers output rows 60..64 and cols 80..84.
        assert!((60..64).contains(&at.0), "peak row {}", at.0);
        assert!((80..84).contains(&at.1), "peak col {}", at.1);
    }
}
