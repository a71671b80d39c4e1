use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::{Result, SpikePursuitError};

/// Minimum pixel count (h*w) to justify row-level parallelism within one image.
const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Gaussian blur of one image with a separable kernel of radius `ceil(2 * sigma)`.
///
/// Borders are replicated. A non-positive sigma returns the input unchanged.
pub fn gaussian_blur(image: ArrayView2<f64>, sigma: f64) -> Array2<f64> {
    if sigma <= 0.0 {
        return image.to_owned();
    }
    let kernel = make_gaussian_kernel(sigma);
    let row_pass = convolve_rows(image, &kernel);
    convolve_cols(row_pass.view(), &kernel)
}

/// Blur every frame of a frames x pixels matrix whose rows are `height x width` images
/// stored row-major.
pub fn blur_frames(data: &Array2<f64>, height: usize, width: usize, sigma: f64) -> Result<Array2<f64>> {
    let (frames, pixels) = data.dim();
    if pixels != height * width {
        return Err(SpikePursuitError::degenerate(format!(
            "{pixels} pixel columns cannot form {height}x{width} frames"
        )));
    }

    let blur_frame = |t: usize| -> Vec<f64> {
        let frame = Array2::from_shape_fn((height, width), |(r, c)| data[[t, r * width + c]]);
        gaussian_blur(frame.view(), sigma).into_iter().collect()
    };

    let blurred: Vec<Vec<f64>> = if frames >= PARALLEL_FRAME_THRESHOLD {
        (0..frames).into_par_iter().map(blur_frame).collect()
    } else {
        (0..frames).map(blur_frame).collect()
    };

    let mut result = Array2::<f64>::zeros((frames, pixels));
    for (t, values) in blurred.into_iter().enumerate() {
        for (p, v) in values.into_iter().enumerate() {
            result[[t, p]] = v;
        }
    }
    Ok(result)
}

/// Normalized kernel of size `2 * ceil(2 * sigma) + 1`.
pub fn make_gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (2.0 * sigma).ceil() as usize;
    let size = 2 * radius + 1;
    let mut kernel = vec![0.0f64; size];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f64;

    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f64 - radius as f64;
        *k = (-x * x / s2).exp();
        sum += *k;
    }

    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}

fn convolve_rows(data: ArrayView2<f64>, kernel: &[f64]) -> Array2<f64> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;

    let row_values = |row: usize| -> Vec<f64> {
        (0..w)
            .map(|col| {
                let mut sum = 0.0f64;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let src_col = (col as isize + ki as isize - radius as isize)
                        .clamp(0, w as isize - 1) as usize;
                    sum += data[[row, src_col]] * kv;
                }
                sum
            })
            .collect()
    };

    let rows: Vec<Vec<f64>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(row_values).collect()
    } else {
        (0..h).map(row_values).collect()
    };
    assemble(rows, h, w)
}

fn convolve_cols(data: ArrayView2<f64>, kernel: &[f64]) -> Array2<f64> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;

    let row_values = |row: usize| -> Vec<f64> {
        (0..w)
            .map(|col| {
                let mut sum = 0.0f64;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let src_row = (row as isize + ki as isize - radius as isize)
                        .clamp(0, h as isize - 1) as usize;
                    sum += data[[src_row, col]] * kv;
                }
                sum
            })
            .collect()
    };

    let rows: Vec<Vec<f64>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(row_values).collect()
    } else {
        (0..h).map(row_values).collect()
    };
    assemble(rows, h, w)
}

fn assemble(rows: Vec<Vec<f64>>, h: usize, w: usize) -> Array2<f64> {
    let mut result = Array2::<f64>::zeros((h, w));
    for (row, row_data) in rows.into_iter().enumerate() {
        for (col, val) in row_data.into_iter().enumerate() {
            result[[row, col]] = val;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_size_and_normalization() {
        let k = make_gaussian_kernel(1.5);
        assert_eq!(k.len(), 7);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(k[3] > k[2] && (k[2] - k[4]).abs() < 1e-15);
    }

    #[test]
    fn constant_image_unchanged() {
        let img = Array2::from_elem((5, 7), 3.0);
        let out = gaussian_blur(img.view(), 2.0);
        assert!(out.iter().all(|v| (v - 3.0).abs() < 1e-12));
    }

    #[test]
    fn blur_frames_matches_single_image() {
        let img = Array2::from_shape_fn((4, 5), |(r, c)| (r * 5 + c) as f64);
        let flat = Array2::from_shape_fn((2, 20), |(t, p)| img[[p / 5, p % 5]] * (t + 1) as f64);
        let out = blur_frames(&flat, 4, 5, 1.0).unwrap();
        let single = gaussian_blur(img.view(), 1.0);
        for p in 0..20 {
            assert!((out[[0, p]] - single[[p / 5, p % 5]]).abs() < 1e-12);
            assert!((out[[1, p]] - 2.0 * single[[p / 5, p % 5]]).abs() < 1e-12);
        }
    }

    #[test]
    fn blur_frames_rejects_bad_shape() {
        let flat = Array2::<f64>::zeros((2, 10));
        assert!(blur_frames(&flat, 3, 3, 1.0).is_err());
    }
}
