use crate::error::{Result, SpikePursuitError};

use super::{fft_real, ifft_real};

/// Expand a one-sided spectrum of `nfft / 2 + 1` bins (even `nfft`) to all `nfft` bins.
pub fn mirror_onesided(onesided: &[f64]) -> Vec<f64> {
    let mut full = onesided.to_vec();
    if onesided.len() > 2 {
        full.extend(onesided[1..onesided.len() - 1].iter().rev());
    }
    full
}

/// Divide the spectrum of `data` (zero-padded to `psd.len()`) by `sqrt(psd)`
/// and return the real part of the inverse transform, `psd.len()` samples long.
pub fn whiten(data: &[f64], psd: &[f64]) -> Result<Vec<f64>> {
    if let Some(bin) = psd.iter().position(|&p| !(p > 0.0)) {
        return Err(SpikePursuitError::degenerate(format!(
            "noise spectrum has a non-positive bin at {bin}"
        )));
    }
    let nfft = psd.len();
    let mut spectrum = fft_real(data, nfft);
    for (c, &p) in spectrum.iter_mut().zip(psd) {
        *c /= p.sqrt();
    }
    Ok(ifft_real(spectrum))
}
