use std::path::Path;

use image::{GrayImage, Luma};
use ndarray::Array2;

use crate::error::Result;

/// Load an ROI mask from a grayscale image; any non-zero pixel is inside the ROI.
pub fn load_mask(path: &Path) -> Result<Array2<bool>> {
    let img = image::open(path)?;
    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    let mut mask = Array2::from_elem((h as usize, w as usize), false);

    for row in 0..h as usize {
        for col in 0..w as usize {
            let pixel = gray.get_pixel(col as u32, row as u32);
            mask[[row, col]] = pixel.0[0] != 0;
        }
    }

    Ok(mask)
}

/// Save a mask as an 8-bit PNG (255 inside, 0 outside).
pub fn save_mask(mask: &Array2<bool>, path: &Path) -> Result<()> {
    let (h, w) = mask.dim();
    let mut img = GrayImage::new(w as u32, h as u32);
    for ((row, col), &v) in mask.indexed_iter() {
        img.put_pixel(col as u32, row as u32, Luma([if v { 255 } else { 0 }]));
    }
    img.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_survives_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roi.png");
        let mut mask = Array2::from_elem((4, 6), false);
        mask[[1, 2]] = true;
        mask[[3, 5]] = true;
        save_mask(&mask, &path).unwrap();
        assert_eq!(load_mask(&path).unwrap(), mask);
    }
}
