use ndarray::Array2;

use spikepursuit_core::error::{ErrorKind, SpikePursuitError};
use spikepursuit_core::roi::{align_mask, dilate_disk, dilate_square, BoundingBox, CellRegion};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn block_mask(h: usize, w: usize, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>) -> Array2<bool> {
    Array2::from_shape_fn((h, w), |(r, c)| rows.contains(&r) && cols.contains(&c))
}

fn count(mask: &Array2<bool>) -> usize {
    mask.iter().filter(|&&v| v).count()
}

// ---------------------------------------------------------------------------
// Morphology
// ---------------------------------------------------------------------------

#[test]
fn test_square_dilation_of_block() {
    let mask = block_mask(12, 12, 5..7, 5..7);
    let out = dilate_square(&mask, 5);
    assert_eq!(count(&out), 36);
    assert_eq!(BoundingBox::of_mask(&out).unwrap(), BoundingBox { top: 3, left: 3, bottom: 8, right: 8 });
}

#[test]
fn test_disk_dilation_of_block() {
    let mask = block_mask(16, 16, 6..9, 6..9);
    let out = dilate_disk(&mask, 3);
    assert_eq!(count(&out), 61);
    assert!(out[[3, 7]] && out[[11, 7]]);
    assert!(!out[[3, 5]]);
}

#[test]
fn test_zero_radius_disk_is_identity() {
    let mask = block_mask(6, 6, 1..3, 2..5);
    assert_eq!(dilate_disk(&mask, 0), mask);
}

// ---------------------------------------------------------------------------
// Mask alignment
// ---------------------------------------------------------------------------

#[test]
fn test_align_keeps_matching_mask() {
    let mask = block_mask(4, 7, 1..2, 3..5);
    assert_eq!(align_mask(&mask, 4, 7).unwrap(), mask);
}

#[test]
fn test_align_mismatch_reports_both_shapes() {
    let mask = block_mask(5, 5, 1..2, 1..2);
    match align_mask(&mask, 4, 7) {
        Err(err @ SpikePursuitError::DimensionMismatch { .. }) => {
            assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
            let msg = err.to_string();
            assert!(msg.contains("5x5") && msg.contains("4x7"), "{msg}");
        }
        other => panic!("expected dimension mismatch, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Cell regions
// ---------------------------------------------------------------------------

#[test]
fn test_region_context_clipped_at_frame_corner() {
    let mask = block_mask(16, 16, 0..1, 0..1);
    let region = CellRegion::new(&mask, 11, 2).unwrap();
    assert_eq!(region.window, BoundingBox { top: 0, left: 0, bottom: 5, right: 5 });
    assert_eq!(region.roi_indices(), vec![0]);
}

#[test]
fn test_region_large_context_covers_frame() {
    let mask = block_mask(16, 16, 6..9, 6..9);
    let region = CellRegion::new(&mask, 50, 3).unwrap();
    assert_eq!((region.height(), region.width()), (16, 16));
    assert_eq!(region.roi_indices().len(), 9);
    assert_eq!(region.background_indices().len(), 256 - 61);
    assert_eq!(region.roi_indices()[0], 6 * 16 + 6);
}

#[test]
fn test_region_roi_and_background_never_overlap() {
    let mask = block_mask(30, 24, 10..15, 4..9);
    let region = CellRegion::new(&mask, 21, 4).unwrap();
    let roi = region.roi_indices();
    let background = region.background_indices();
    assert!(roi.iter().all(|p| !background.contains(p)));
    assert_eq!(roi.len(), 25);
}

#[test]
fn test_region_background_empty_when_censor_covers_crop() {
    let mask = block_mask(10, 10, 4..6, 4..6);
    let region = CellRegion::new(&mask, 4, 20).unwrap();
    assert!(region.background_indices().is_empty());
}

#[test]
fn test_region_rejects_empty_mask() {
    let mask = Array2::from_elem((8, 8), false);
    let err = CellRegion::new(&mask, 10, 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DegenerateInput);
}
