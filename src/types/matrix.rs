//! Output matrix types handed to the renderer

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{OverlayError, Result};

/// Output resolution of the intensity matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetSize {
    /// Output columns.
    pub width: usize,
    /// Output rows.
    pub height: usize,
}

impl TargetSize {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let size = Self { width, height };
        size.validate()?;
        Ok(size)
    }

    /// Reject sizes with a zero dimension.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(OverlayError::InvalidTargetSize { width: self.width, height: self.height });
        }
        Ok(())
    }

    /// Total number of cells.
    pub fn cells(&self) -> usize {
        self.width * self.height
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        Self { width: 1600, height: 1200 }
    }
}

/// A grid of 8-bit normalized intensities.
///
/// Zero means "no signal"; every other cell lies in `1..=255`. The matrix is
/// allocated fresh per frame and owned by whoever receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityMatrix {
    cells: Array2<u8>,
}

impl IntensityMatrix {
    pub(crate) fn from_array(cells: Array2<u8>) -> Self {
        Self { cells }
    }

    pub fn rows(&self) -> usize {
        self.cells.nrows()
    }

    pub fn cols(&self) -> usize {
        self.cells.ncols()
    }

    /// Cell at `(row, col)`, or `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.cells.get((row, col)).copied()
    }

    /// Borrow the underlying array.
    pub fn view(&self) -> ndarray::ArrayView2<'_, u8> {
        self.cells.view()
    }

    /// Row-major copy of the cells, e.g. for uploading into a texture.
    pub fn to_row_major(&self) -> Vec<u8> {
        self.cells.iter().copied().collect()
    }

    /// Number of cells carrying signal.
    pub fn count_nonzero(&self) -> usize {
        self.cells.iter().filter(|&&v| v != 0).count()
    }

    /// Highest cell value.
    pub fn max(&self) -> u8 {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    /// Whether every cell is zero.
    pub fn is_silent(&self) -> bool {
        self.cells.iter().all(|&v| v == 0)
    }
}

/// A finished matrix together with the metadata of the frame it came from.
#[derive(Debug, Clone)]
pub struct IntensityFrame {
    /// Event id reported by the device.
    pub event_id: i32,
    /// Arrival order on the link, starting at 1 for each session.
    ///
    /// Workers may finish out of order; renderers that need ordering can
    /// discard frames older than the last one drawn.
    pub sequence: u64,
    /// Gain reported with the frame.
    pub gain: i32,
    /// The normalized matrix.
    pub matrix: IntensityMatrix,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_size_rejects_zero_dimensions() {
        assert!(TargetSize::new(1600, 1200).is_ok());
        assert!(matches!(
            TargetSize::new(0, 1200),
            Err(OverlayError::InvalidTargetSize { width: 0, height: 1200 })
        ));
        assert!(TargetSize::new(40, 0).is_err());
        assert_eq!(TargetSize::default().cells(), 1600 * 1200);
    }

    #[test]
    fn matrix_accessors() {
        let mut cells = Array2::<u8>::zeros((2, 3));
        cells[(1, 2)] = 255;
        cells[(0, 1)] = 7;
        let matrix = IntensityMatrix::from_array(cells);

        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.cols(), 3);
        assert_eq!(matrix.get(1, 2), Some(255));
        assert_eq!(matrix.get(2, 0), None);
        assert_eq!(matrix.count_nonzero(), 2);
        assert_eq!(matrix.max(), 255);
        assert!(!matrix.is_silent());
        assert_eq!(matrix.to_row_major(), vec![0, 7, 0, 0, 0, 255]);
    }
}
