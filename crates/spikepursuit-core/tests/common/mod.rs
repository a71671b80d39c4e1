#![allow(dead_code)]

use ndarray::{Array2, Array3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Spike times spaced roughly `spacing` samples apart, with uniform jitter of
/// up to `jitter` samples, starting after `start`.
pub fn spike_times(count: usize, spacing: usize, jitter: usize, start: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let offset = if jitter > 0 {
                rng.gen_range(0..=2 * jitter) as isize - jitter as isize
            } else {
                0
            };
            (start as isize + (i * spacing) as isize + offset) as usize
        })
        .collect()
}

/// Unit-amplitude Gaussian pulse train with the given width (samples).
pub fn pulse_train(len: usize, spikes: &[usize], width: f64) -> Vec<f64> {
    let mut out = vec![0.0; len];
    let reach = (4.0 * width).ceil() as isize;
    for &s in spikes {
        for d in -reach..=reach {
            let i = s as isize + d;
            if i >= 0 && (i as usize) < len {
                out[i as usize] += (-(d * d) as f64 / (2.0 * width * width)).exp();
            }
        }
    }
    out
}

/// White Gaussian noise.
pub fn white_noise(len: usize, sigma: f64, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).unwrap();
    (0..len).map(|_| normal.sample(&mut rng)).collect()
}

/// Positive-going spikes of `amplitude` on white noise.
pub fn noisy_spike_trace(
    len: usize,
    spikes: &[usize],
    amplitude: f64,
    noise_sigma: f64,
    seed: u64,
) -> Vec<f64> {
    pulse_train(len, spikes, 1.0)
        .into_iter()
        .zip(white_noise(len, noise_sigma, seed))
        .map(|(s, n)| amplitude * s + n)
        .collect()
}

/// Fraction of `truth` matched by some entry of `detected` within `tolerance` samples.
pub fn recall(truth: &[usize], detected: &[usize], tolerance: usize) -> f64 {
    let hits = truth
        .iter()
        .filter(|&&t| detected.iter().any(|&d| d.abs_diff(t) <= tolerance))
        .count();
    hits as f64 / truth.len() as f64
}

/// Layout of a single-cell synthetic recording.
#[derive(Clone, Debug)]
pub struct MovieSpec {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    /// Inclusive-exclusive ROI rows and columns.
    pub roi_rows: (usize, usize),
    pub roi_cols: (usize, usize),
    /// Negative-going spike amplitude per ROI pixel.
    pub spike_amplitude: f64,
    pub noise_sigma: f64,
    pub spike_count: usize,
    pub spike_spacing: usize,
    pub seed: u64,
}

impl Default for MovieSpec {
    fn default() -> Self {
        Self {
            frames: 4000,
            height: 16,
            width: 16,
            roi_rows: (6, 9),
            roi_cols: (6, 9),
            spike_amplitude: 3.0,
            noise_sigma: 1.0,
            spike_count: 50,
            spike_spacing: 76,
            seed: 7,
        }
    }
}

/// A synthetic recording, its ROI mask and the true spike times.
pub struct Movie {
    pub video: Array3<f64>,
    pub mask: Array2<bool>,
    pub spikes: Vec<usize>,
}

/// Baseline 100, a slow drift and a fast shared background on every pixel,
/// negative-going spikes inside the ROI, white noise everywhere.
pub fn synthetic_movie(spec: &MovieSpec) -> Movie {
    let MovieSpec {
        frames,
        height,
        width,
        roi_rows,
        roi_cols,
        ..
    } = *spec;
    let spikes = spike_times(spec.spike_count, spec.spike_spacing, 10, 100, spec.seed);
    let pulses = pulse_train(frames, &spikes, 1.0);
    let noise = white_noise(frames * height * width, spec.noise_sigma, spec.seed + 1);

    let mut mask = Array2::from_elem((height, width), false);
    for r in roi_rows.0..roi_rows.1 {
        for c in roi_cols.0..roi_cols.1 {
            mask[[r, c]] = true;
        }
    }

    let video = Array3::from_shape_fn((frames, height, width), |(t, r, c)| {
        let tf = t as f64;
        let gain = 0.5 + (r + c) as f64 / (height + width) as f64;
        let drift = 5.0 * (2.0 * std::f64::consts::PI * tf / 4000.0).sin();
        let shared = 0.6 * (2.0 * std::f64::consts::PI * 7.0 * tf / 400.0).sin();
        let spike = if mask[[r, c]] {
            -spec.spike_amplitude * pulses[t]
        } else {
            0.0
        };
        100.0 + gain * (drift + shared) + spike + noise[(t * height + r) * width + c]
    });

    Movie {
        video,
        mask,
        spikes,
    }
}
