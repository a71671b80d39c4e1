pub mod welch;
pub mod whiten;

use num_complex::Complex;
use rustfft::FftPlanner;

pub use welch::{hamming_periodic, welch_psd, WelchParams};
pub use whiten::{mirror_onesided, whiten};

/// Smallest power of two not below `len`.
pub fn next_pow2(len: usize) -> usize {
    len.max(1).next_power_of_two()
}

/// Forward FFT of a real signal zero-padded (or truncated) to `n` points.
pub(crate) fn fft_real(data: &[f64], n: usize) -> Vec<Complex<f64>> {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let mut buffer: Vec<Complex<f64>> = (0..n)
        .map(|i| Complex::new(data.get(i).copied().unwrap_or(0.0), 0.0))
        .collect();
    fft.process(&mut buffer);
    buffer
}

/// Inverse FFT returning the real part, normalized by `1/n`.
pub(crate) fn ifft_real(spectrum: Vec<Complex<f64>>) -> Vec<f64> {
    let n = spectrum.len();
    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(n);
    let mut buffer = spectrum;
    ifft.process(&mut buffer);
    let norm = 1.0 / n as f64;
    buffer.iter().map(|c| c.re * norm).collect()
}
