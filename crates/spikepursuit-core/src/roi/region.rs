use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SpikePursuitError};

use super::morphology::{dilate_disk, dilate_square};

/// Inclusive pixel bounds of a rectangular window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl BoundingBox {
    /// Smallest box containing every true pixel, `None` for an empty mask.
    pub fn of_mask(mask: &Array2<bool>) -> Option<Self> {
        let mut bbox: Option<Self> = None;
        for ((r, c), &v) in mask.indexed_iter() {
            if !v {
                continue;
            }
            bbox = Some(match bbox {
                None => Self {
                    top: r,
                    left: c,
                    bottom: r,
                    right: c,
                },
                Some(b) => Self {
                    top: b.top.min(r),
                    left: b.left.min(c),
                    bottom: b.bottom.max(r),
                    right: b.right.max(c),
                },
            });
        }
        bbox
    }

    pub fn height(&self) -> usize {
        self.bottom - self.top + 1
    }

    pub fn width(&self) -> usize {
        self.right - self.left + 1
    }

    pub fn rows(&self) -> std::ops::Range<usize> {
        self.top..self.bottom + 1
    }

    pub fn cols(&self) -> std::ops::Range<usize> {
        self.left..self.right + 1
    }
}

/// Bring a mask into the `height x width` frame orientation.
///
/// A mask shaped like the transposed frame is transposed. Any other shape
/// is a [`SpikePursuitError::DimensionMismatch`].
pub fn align_mask(mask: &Array2<bool>, height: usize, width: usize) -> Result<Array2<bool>> {
    let (mh, mw) = mask.dim();
    if (mh, mw) == (height, width) {
        return Ok(mask.clone());
    }
    if (mw, mh) == (height, width) {
        warn!(mask_height = mh, mask_width = mw, "ROI mask is transposed relative to the video, realigning");
        return Ok(mask.t().to_owned());
    }
    Err(SpikePursuitError::DimensionMismatch {
        mask_height: mh,
        mask_width: mw,
        height,
        width,
    })
}

/// Spatial layout of one cell inside its context crop.
#[derive(Clone, Debug)]
pub struct CellRegion {
    /// Crop window in frame coordinates.
    pub window: BoundingBox,
    /// ROI pixels within the crop.
    pub roi: Array2<bool>,
    /// Background pixels within the crop: outside the censor disk around the ROI.
    pub background: Array2<bool>,
}

impl CellRegion {
    /// Crop an aligned frame-sized mask to its context window.
    pub fn new(mask: &Array2<bool>, context_size: usize, censor_size: usize) -> Result<Self> {
        if BoundingBox::of_mask(mask).is_none() {
            return Err(SpikePursuitError::degenerate("ROI mask is empty"));
        }
        let context = dilate_square(mask, context_size.max(1));
        let window = BoundingBox::of_mask(&context)
            .ok_or_else(|| SpikePursuitError::degenerate("ROI mask is empty"))?;

        let roi = mask.slice(s![window.rows(), window.cols()]).to_owned();
        let background = dilate_disk(&roi, censor_size).mapv(|v| !v);
        debug!(
            height = window.height(),
            width = window.width(),
            roi_pixels = roi.iter().filter(|&&v| v).count(),
            background_pixels = background.iter().filter(|&&v| v).count(),
            "Cell region"
        );
        Ok(Self {
            window,
            roi,
            background,
        })
    }

    pub fn height(&self) -> usize {
        self.window.height()
    }

    pub fn width(&self) -> usize {
        self.window.width()
    }

    /// Row-major flat indices of ROI pixels within the crop.
    pub fn roi_indices(&self) -> Vec<usize> {
        flat_indices(&self.roi)
    }

    /// Row-major flat indices of background pixels within the crop.
    pub fn background_indices(&self) -> Vec<usize> {
        flat_indices(&self.background)
    }
}

fn flat_indices(mask: &Array2<bool>) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, &v)| v)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_of_mask() {
        let mut m = Array2::from_elem((5, 6), false);
        m[[1, 4]] = true;
        m[[3, 2]] = true;
        let b = BoundingBox::of_mask(&m).unwrap();
        assert_eq!(
            b,
            BoundingBox {
                top: 1,
                left: 2,
                bottom: 3,
                right: 4
            }
        );
        assert_eq!((b.height(), b.width()), (3, 3));
        assert!(BoundingBox::of_mask(&Array2::from_elem((2, 2), false)).is_none());
    }

    #[test]
    fn align_transposed_mask() {
        let mut m = Array2::from_elem((3, 5), false);
        m[[0, 4]] = true;
        let aligned = align_mask(&m, 5, 3).unwrap();
        assert_eq!(aligned.dim(), (5, 3));
        assert!(aligned[[4, 0]]);
    }

    #[test]
    fn align_rejects_other_shapes() {
        let m = Array2::from_elem((3, 4), false);
        let err = align_mask(&m, 5, 3).unwrap_err();
        assert!(matches!(err, SpikePursuitError::DimensionMismatch { .. }));
    }

    #[test]
    fn region_background_disjoint_from_roi() {
        let mut m = Array2::from_elem((20, 20), false);
        for r in 9..11 {
            for c in 9..11 {
                m[[r, c]] = true;
            }
        }
        let region = CellRegion::new(&m, 11, 2).unwrap();
        assert_eq!(region.height(), 12);
        assert_eq!(region.width(), 12);
        for (roi, bg) in region.roi.iter().zip(region.background.iter()) {
            assert!(!(roi & bg));
        }
        assert_eq!(region.roi_indices().len(), 4);
        assert!(!region.background_indices().is_empty());
    }

    #[test]
    fn empty_roi_is_degenerate() {
        let m = Array2::from_elem((4, 4), false);
        assert!(CellRegion::new(&m, 3, 1).is_err());
    }
}
