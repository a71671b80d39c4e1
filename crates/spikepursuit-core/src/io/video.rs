use std::ops::Range;

use ndarray::{s, Array3};

use crate::error::{Result, SpikePursuitError};

/// Read-only access to a frames x height x width recording.
///
/// Implementations must be shareable across the cell worker pool.
pub trait VideoSource: Send + Sync {
    /// `(frames, height, width)`.
    fn dims(&self) -> (usize, usize, usize);

    /// Copy a sub-volume as `f64`, indexed `[frame, row, col]`.
    fn read_region(
        &self,
        frames: Range<usize>,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> Result<Array3<f64>>;

    fn frame_count(&self) -> usize {
        self.dims().0
    }

    /// `(height, width)` of a single frame.
    fn frame_shape(&self) -> (usize, usize) {
        let (_, h, w) = self.dims();
        (h, w)
    }
}

/// Check that a requested region lies inside a `(frames, height, width)` volume.
pub fn check_region(
    dims: (usize, usize, usize),
    frames: &Range<usize>,
    rows: &Range<usize>,
    cols: &Range<usize>,
) -> Result<()> {
    let (t, h, w) = dims;
    let bad = |r: &Range<usize>, limit: usize| r.start > r.end || r.end > limit;
    if bad(frames, t) || bad(rows, h) || bad(cols, w) {
        return Err(SpikePursuitError::RegionOutOfRange(format!(
            "frames {frames:?}, rows {rows:?}, cols {cols:?} outside a {t}x{h}x{w} video"
        )));
    }
    Ok(())
}

/// A recording held entirely in memory.
#[derive(Clone, Debug)]
pub struct InMemoryVideo {
    data: Array3<f64>,
}

impl InMemoryVideo {
    pub fn new(data: Array3<f64>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }
}

impl VideoSource for InMemoryVideo {
    fn dims(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    fn read_region(
        &self,
        frames: Range<usize>,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> Result<Array3<f64>> {
        check_region(self.dims(), &frames, &rows, &cols)?;
        Ok(self.data.slice(s![frames, rows, cols]).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_region_copies_sub_volume() {
        let data = Array3::from_shape_fn((3, 4, 5), |(t, r, c)| (t * 100 + r * 10 + c) as f64);
        let video = InMemoryVideo::new(data);
        let region = video.read_region(1..3, 2..4, 0..2).unwrap();
        assert_eq!(region.dim(), (2, 2, 2));
        assert_eq!(region[[0, 0, 0]], 120.0);
        assert_eq!(region[[1, 1, 1]], 231.0);
        assert_eq!(video.frame_shape(), (4, 5));
    }

    #[test]
    fn out_of_range_region_rejected() {
        let video = InMemoryVideo::new(Array3::zeros((2, 2, 2)));
        let err = video.read_region(0..2, 0..3, 0..2).unwrap_err();
        assert!(matches!(err, SpikePursuitError::RegionOutOfRange(_)));
    }
}
