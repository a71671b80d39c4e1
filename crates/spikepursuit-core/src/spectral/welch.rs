use crate::error::{Result, SpikePursuitError};

use super::fft_real;

/// Parameters of a Welch power spectral density estimate.
#[derive(Clone, Copy, Debug)]
pub struct WelchParams {
    /// Segment length; 50% overlap between consecutive segments.
    pub segment_len: usize,
    /// FFT length per segment (zero-padded), at least `segment_len`.
    pub nfft: usize,
    /// Sampling frequency used for density scaling.
    pub fs: f64,
}

/// Periodic Hamming window (the DFT-even variant).
pub fn hamming_periodic(len: usize) -> Vec<f64> {
    (0..len)
        .map(|n| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * n as f64 / len as f64).cos())
        .collect()
}

/// One-sided Welch PSD with a periodic Hamming window, no detrending and
/// density scaling. Returns `nfft / 2 + 1` bins.
pub fn welch_psd(x: &[f64], params: &WelchParams) -> Result<Vec<f64>> {
    let WelchParams {
        segment_len,
        nfft,
        fs,
    } = *params;
    if segment_len == 0 || x.len() < segment_len {
        return Err(SpikePursuitError::degenerate(format!(
            "Welch estimate needs at least {segment_len} samples, got {}",
            x.len()
        )));
    }
    if nfft < segment_len {
        return Err(SpikePursuitError::InvalidConfig(format!(
            "nfft {nfft} is shorter than the segment length {segment_len}"
        )));
    }

    let window = hamming_periodic(segment_len);
    let scale = 1.0 / (fs * window.iter().map(|w| w * w).sum::<f64>());
    let step = segment_len - segment_len / 2;
    let segments = (x.len() - segment_len) / step + 1;
    let bins = nfft / 2 + 1;

    let mut psd = vec![0.0f64; bins];
    let mut segment = vec![0.0f64; segment_len];
    for s in 0..segments {
        let start = s * step;
        for (i, v) in segment.iter_mut().enumerate() {
            *v = x[start + i] * window[i];
        }
        let spectrum = fft_real(&segment, nfft);
        for (k, p) in psd.iter_mut().enumerate() {
            *p += spectrum[k].norm_sqr() * scale;
        }
    }

    let last_doubled = if nfft % 2 == 0 { bins - 1 } else { bins };
    for p in psd.iter_mut().take(last_doubled).skip(1) {
        *p *= 2.0;
    }
    for p in &mut psd {
        *p /= segments as f64;
    }
    Ok(psd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hamming_periodic_endpoints() {
        let w = hamming_periodic(4);
        assert!((w[0] - 0.08).abs() < 1e-12);
        assert!((w[2] - 1.0).abs() < 1e-12);
        assert!((w[1] - w[3]).abs() < 1e-12);
    }

    #[test]
    fn white_noise_psd_is_flat_in_expectation() {
        // Parseval: the integrated density equals the variance.
        let x: Vec<f64> = (0..4096)
            .map(|i| if (i * 7919) % 13 < 6 { 1.0 } else { -1.0 })
            .collect();
        let mean = x.iter().sum::<f64>() / x.len() as f64;
        let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / x.len() as f64;
        let params = WelchParams {
            segment_len: 256,
            nfft: 256,
            fs: 1.0,
        };
        let psd = welch_psd(&x, &params).unwrap();
        assert_eq!(psd.len(), 129);
        let power: f64 = psd.iter().sum::<f64>() / 256.0;
        let total = var + mean * mean;
        assert!((power - total).abs() / total < 0.2, "power {power} vs {total}");
    }

    #[test]
    fn too_short_input_rejected() {
        let params = WelchParams {
            segment_len: 100,
            nfft: 128,
            fs: 1.0,
        };
        assert!(welch_psd(&[0.0; 50], &params).is_err());
    }
}
