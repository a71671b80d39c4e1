use tracing::debug;

use crate::consts::{MIN_SPIKE_COUNT, THRESHOLD_GRID_MARGIN, THRESHOLD_GRID_POINTS};
use crate::error::{Result, SpikePursuitError};
use crate::stats::{argmax, linspace, median, percentile};
use crate::trace::ThresholdModel;

use super::kde::GaussianKde;

/// Chooses a spike threshold from the distribution of peak heights.
///
/// The noise peaks are modelled by mirroring the lower half of the height
/// density around its median. The threshold maximizes the gap between the
/// `pnorm`-compressed survival functions of the data and of that model.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdEstimator {
    /// Maximum number of peaks to keep above threshold; 0 disables clipping.
    pub clip: usize,
    /// Exponent in (0, 1]; larger values lower the threshold, trading more
    /// false positives for more detections.
    pub pnorm: f64,
}

impl ThresholdEstimator {
    pub fn new(clip: usize, pnorm: f64) -> Self {
        Self { clip, pnorm }
    }

    pub fn estimate(&self, peaks: &[f64]) -> Result<ThresholdModel> {
        if !(self.pnorm > 0.0 && self.pnorm <= 1.0) {
            return Err(SpikePursuitError::InvalidConfig(format!(
                "pnorm {} must lie in (0, 1]",
                self.pnorm
            )));
        }
        let kde = GaussianKde::scott(peaks)?;

        let (lo, hi) = peaks
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let margin = (hi - lo) * THRESHOLD_GRID_MARGIN;
        let grid = linspace(lo - margin, hi + margin, THRESHOLD_GRID_POINTS);
        let f = kde.evaluate(&grid);
        let n = f.len();

        let med = median(peaks);
        let center = grid.iter().position(|&x| x > med).unwrap_or(n - 1);

        let mut model = mirrored_model(&f, center);

        // Keep the model from exceeding the data.
        let sum_f: f64 = f.iter().sum();
        let sum_model: f64 = model.iter().sum();
        let csf = normalized_cumsum(&f, sum_f);
        let csmodel = normalized_cumsum(&model, sum_f.max(sum_model));
        let lastpt = (0..n - 1)
            .find(|&i| csf[i] > csmodel[i] + f64::EPSILON && csf[i + 1] < csmodel[i + 1])
            .unwrap_or(center);
        model[..=lastpt].copy_from_slice(&f[..=lastpt]);
        for i in lastpt..n {
            model[i] = model[i].min(f[i]);
        }

        let data_survival = survival(&f);
        let model_survival = survival(&model);
        let objective: Vec<f64> = data_survival
            .iter()
            .zip(&model_survival)
            .map(|(&d, &m)| d.powf(self.pnorm) - m.powf(self.pnorm))
            .collect();
        let mut threshold = grid[argmax(&objective)];

        let count = peaks.iter().filter(|&&p| p > threshold).count();
        let total = peaks.len() as f64;
        let mut low_spikes = false;
        if count < MIN_SPIKE_COUNT {
            low_spikes = true;
            debug!(
                count,
                min = MIN_SPIKE_COUNT,
                "Few peaks above threshold, keeping the largest instead"
            );
            threshold = percentile(peaks, 100.0 * (1.0 - MIN_SPIKE_COUNT as f64 / total));
        } else if self.clip > 0 && count > self.clip {
            debug!(count, clip = self.clip, "Clipping peaks above threshold");
            threshold = percentile(peaks, 100.0 * (1.0 - self.clip as f64 / total));
        }

        let ix = nearest(&grid, threshold);
        let gaps: Vec<f64> = data_survival
            .iter()
            .zip(&model_survival)
            .map(|(&d, &m)| d - m)
            .collect();
        let max_gap = gaps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let false_pos_rate = ratio(model_survival[ix], data_survival[ix]);
        let detection_rate = ratio(gaps[ix], max_gap);

        Ok(ThresholdModel {
            threshold,
            false_pos_rate,
            detection_rate,
            low_spikes,
        })
    }
}

/// `f[0..=center]` followed by `f[0..center]` reversed, padded with its
/// minimum or truncated to `f.len()`.
fn mirrored_model(f: &[f64], center: usize) -> Vec<f64> {
    let n = f.len();
    let mut model: Vec<f64> = f[..=center].to_vec();
    model.extend(f[..center].iter().rev());
    if model.len() < n {
        let floor = model.iter().copied().fold(f64::INFINITY, f64::min);
        model.resize(n, floor);
    } else {
        model.truncate(n);
    }
    model
}

fn normalized_cumsum(values: &[f64], norm: f64) -> Vec<f64> {
    let mut acc = 0.0;
    values
        .iter()
        .map(|&v| {
            acc += v;
            acc / norm
        })
        .collect()
}

/// Unnormalized survival function `total - cumsum`, floored at zero.
fn survival(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    let mut acc = 0.0;
    values
        .iter()
        .map(|&v| {
            acc += v;
            (total - acc).max(0.0)
        })
        .collect()
}

fn nearest(grid: &[f64], x: f64) -> usize {
    let mut best = 0;
    for (i, &g) in grid.iter().enumerate() {
        if (g - x).abs() < (grid[best] - x).abs() {
            best = i;
        }
    }
    best
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
