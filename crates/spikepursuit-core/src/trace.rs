use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::consts::TEMPLATE_HALF_WIDTH_S;
use crate::error::{Result, SpikePursuitError};

/// A single temporal trace (one sample per video frame).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PixelTrace {
    samples: Array1<f64>,
    /// Sample rate in Hz.
    pub sample_rate: f64,
}

impl PixelTrace {
    pub fn new(samples: Array1<f64>, sample_rate: f64) -> Self {
        Self {
            samples: samples.as_standard_layout().into_owned(),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &Array1<f64> {
        &self.samples
    }

    pub fn from_vec(samples: Vec<f64>, sample_rate: f64) -> Self {
        Self::new(Array1::from_vec(samples), sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Contiguous view of the samples.
    pub fn as_slice(&self) -> &[f64] {
        // Standard layout is established in `new`.
        self.samples.as_slice().unwrap_or_default()
    }

    /// A new trace with every sample negated.
    pub fn negated(&self) -> Self {
        Self::new(self.samples.mapv(|v| -v), self.sample_rate)
    }

    /// A new trace with the same rate and different samples.
    pub fn with_samples(&self, samples: Array1<f64>) -> Self {
        Self::new(samples, self.sample_rate)
    }
}

/// Template half-width in samples for a given frame rate.
pub fn half_window(sample_rate: f64) -> usize {
    (sample_rate * TEMPLATE_HALF_WIDTH_S).round() as usize
}

/// Strictly increasing sample indices of detected spikes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpikeTrain(Vec<usize>);

impl SpikeTrain {
    /// Build a spike train, rejecting unsorted or repeated indices.
    pub fn new(indices: Vec<usize>) -> Result<Self> {
        if indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SpikePursuitError::degenerate(
                "spike indices must be strictly increasing",
            ));
        }
        Ok(Self(indices))
    }

    /// Keep only spikes whose full template window fits inside a trace of `len` samples.
    pub fn within_window(indices: Vec<usize>, half_window: usize, len: usize) -> Self {
        let upper = len.saturating_sub(half_window);
        let mut kept: Vec<usize> = indices
            .into_iter()
            .filter(|&i| i >= half_window && i < upper)
            .collect();
        kept.dedup();
        Self(kept)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Peak-triggered average waveform of length `2 * half_window + 1`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Template {
    pub waveform: Array1<f64>,
}

impl Template {
    /// Average the windows `[s - h, s + h]` of `data` around each spike.
    pub fn peak_triggered_average(data: &[f64], spikes: &SpikeTrain, half_window: usize) -> Self {
        let width = 2 * half_window + 1;
        let mut waveform = Array1::<f64>::zeros(width);
        for &s in spikes.indices() {
            for j in 0..width {
                waveform[j] += data[s + j - half_window];
            }
        }
        if !spikes.is_empty() {
            waveform /= spikes.len() as f64;
        }
        Self { waveform }
    }

    pub fn half_window(&self) -> usize {
        self.waveform.len() / 2
    }
}

/// Result of fitting a threshold to a sample of peak heights.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdModel {
    pub threshold: f64,
    pub false_pos_rate: f64,
    pub detection_rate: f64,
    /// Set when the percentile fallback was needed to reach the minimum spike count.
    pub low_spikes: bool,
}
