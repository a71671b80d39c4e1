use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{
    DENOISE_HIGHPASS_HZ, FINAL_PNORM, PROVISIONAL_PNORM, WELCH_SEGMENT_LEN,
};
use crate::detection::peaks::{heights, local_maxima, peaks_above};
use crate::detection::ThresholdEstimator;
use crate::error::{Result, SpikePursuitError};
use crate::filters::highpass;
use crate::spectral::{mirror_onesided, next_pow2, welch_psd, whiten, WelchParams};
use crate::stats::mean_at;
use crate::trace::{half_window, PixelTrace, SpikeTrain, Template};

/// Output of one denoising pass over a trace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenoisedTrace {
    /// Matched-filter output rescaled to the input amplitude at the spikes.
    pub denoised: Array1<f64>,
    pub spikes: SpikeTrain,
    /// Template placed at every detected spike.
    pub guess: Array1<f64>,
    pub false_pos_rate: f64,
    pub detection_rate: f64,
    /// Peak-triggered average of the input around the provisional spikes.
    pub template: Template,
    /// Whether the provisional threshold needed the minimum-count fallback.
    pub low_spikes: bool,
}

/// Spike detector built on a whitened matched filter.
///
/// Provisional spikes come from thresholding the peaks of a 1 Hz high-passed
/// copy of the trace. Their average waveform becomes the template that is
/// correlated with the whitened trace, and the final spikes are taken from
/// the peaks of that correlation.
#[derive(Clone, Copy, Debug)]
pub struct MatchedFilterDenoiser {
    pub half_window: usize,
    /// Maximum number of provisional spikes; 0 keeps all of them.
    pub clip: usize,
}

impl MatchedFilterDenoiser {
    pub fn new(half_window: usize, clip: usize) -> Self {
        Self { half_window, clip }
    }

    /// Denoiser with the half-window derived from the frame rate.
    pub fn for_rate(sample_rate: f64, clip: usize) -> Self {
        Self::new(half_window(sample_rate), clip)
    }

    pub fn denoise(&self, trace: &PixelTrace) -> Result<DenoisedTrace> {
        let data = trace.as_slice();
        let h = self.half_window;
        let len = data.len();
        if len < 2 * h + 2 {
            return Err(SpikePursuitError::degenerate(format!(
                "trace of {len} samples is shorter than the template window"
            )));
        }

        let hp = highpass(data, DENOISE_HIGHPASS_HZ, trace.sample_rate, 1)?;
        let hp_peaks = local_maxima(&hp);
        let provisional_model =
            ThresholdEstimator::new(self.clip, PROVISIONAL_PNORM).estimate(&heights(&hp, &hp_peaks))?;
        let provisional = SpikeTrain::within_window(
            peaks_above(&hp, provisional_model.threshold),
            h,
            len,
        );
        if provisional.len() < 2 {
            return Err(SpikePursuitError::degenerate(format!(
                "{} provisional spikes inside the template window, need at least 2",
                provisional.len()
            )));
        }
        debug!(
            threshold = provisional_model.threshold,
            spikes = provisional.len(),
            low_spikes = provisional_model.low_spikes,
            "Provisional spikes"
        );

        let template = Template::peak_triggered_average(data, &provisional, h);
        let filtered = whitened_matched_filter(data, &provisional, h)?;

        let filt_peaks = local_maxima(&filtered);
        let final_model =
            ThresholdEstimator::new(0, FINAL_PNORM).estimate(&heights(&filtered, &filt_peaks))?;
        let spikes = SpikeTrain::within_window(
            peaks_above(&filtered, final_model.threshold),
            h,
            len,
        );
        if spikes.len() < 2 {
            return Err(SpikePursuitError::degenerate(format!(
                "{} spikes survive the matched filter, need at least 2",
                spikes.len()
            )));
        }
        debug!(
            threshold = final_model.threshold,
            spikes = spikes.len(),
            false_pos_rate = final_model.false_pos_rate,
            detection_rate = final_model.detection_rate,
            "Matched-filter spikes"
        );

        let denoised = correct_shrinkage(&filtered, data, &spikes)?;
        let guess = guess_signal(len, &spikes, &template);

        Ok(DenoisedTrace {
            denoised: Array1::from_vec(denoised),
            spikes,
            guess: Array1::from_vec(guess),
            false_pos_rate: final_model.false_pos_rate,
            detection_rate: final_model.detection_rate,
            template,
            low_spikes: provisional_model.low_spikes,
        })
    }
}

/// Whiten `data` by its noise spectrum and correlate it with the template
/// averaged from the whitened trace around `spikes`.
///
/// The noise spectrum is estimated from samples further than `half_window`
/// from every spike. The output has the length of `data`.
pub fn whitened_matched_filter(
    data: &[f64],
    spikes: &SpikeTrain,
    half_window: usize,
) -> Result<Vec<f64>> {
    let len = data.len();
    let nfft = next_pow2(len);

    let mut censored = vec![false; len];
    for &s in spikes.indices() {
        let lo = s.saturating_sub(half_window);
        let hi = (s + half_window).min(len - 1);
        censored[lo..=hi].iter_mut().for_each(|c| *c = true);
    }
    let noise: Vec<f64> = data
        .iter()
        .zip(&censored)
        .filter(|(_, &c)| !c)
        .map(|(&v, _)| v)
        .collect();
    if noise.len() < 2 {
        return Err(SpikePursuitError::degenerate(
            "too few spike-free samples to estimate the noise spectrum",
        ));
    }

    let params = WelchParams {
        segment_len: WELCH_SEGMENT_LEN.min(noise.len()),
        nfft,
        fs: 2.0 * std::f64::consts::PI,
    };
    let psd = mirror_onesided(&welch_psd(&noise, &params)?);
    let scaled = whiten(data, &psd)?;
    let template = Template::peak_triggered_average(&scaled, spikes, half_window);
    let kernel = template.waveform.as_slice().unwrap_or_default();

    let n = scaled.len() as isize;
    let h = half_window as isize;
    Ok((0..len as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(j, &k)| {
                    let idx = i + j as isize - h;
                    (idx >= 0 && idx < n).then(|| scaled[idx as usize] * k)
                })
                .sum()
        })
        .collect())
}

/// Rescale `filtered` so its mean at the spikes equals the mean of `reference` there.
pub fn correct_shrinkage(filtered: &[f64], reference: &[f64], spikes: &SpikeTrain) -> Result<Vec<f64>> {
    let target = mean_at(reference, spikes.indices());
    let current = mean_at(filtered, spikes.indices());
    if !(current.abs() > 0.0) || !target.is_finite() {
        return Err(SpikePursuitError::degenerate(
            "cannot rescale a trace that is zero at every spike",
        ));
    }
    let scale = target / current;
    Ok(filtered.iter().map(|v| v * scale).collect())
}

/// Impulses at `spikes` convolved with the template, centred on each spike.
pub fn guess_signal(len: usize, spikes: &SpikeTrain, template: &Template) -> Vec<f64> {
    let h = template.half_window();
    let mut guess = vec![0.0f64; len];
    for &s in spikes.indices() {
        for (j, &w) in template.waveform.iter().enumerate() {
            let idx = s + j;
            if idx >= h && idx - h < len {
                guess[idx - h] += w;
            }
        }
    }
    guess
}
