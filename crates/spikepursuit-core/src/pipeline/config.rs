use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_CENSOR_SIZE, DEFAULT_CONTEXT_SIZE, DEFAULT_CV_FOLDS, DEFAULT_INITIAL_CLIP,
    DEFAULT_LAMBDA_INDEX, DEFAULT_N_ITER, DEFAULT_N_PC_BG, DEFAULT_REFINE_CLIP,
    DEFAULT_SAMPLE_RATE, DEFAULT_SIGMAS, DEFAULT_SIGMA_INDEX, DEFAULT_TAU_LP, DEFAULT_TAU_PRED,
    RIDGE_LAMBDA_SCALES,
};
use crate::error::{Result, SpikePursuitError};
use crate::trace::half_window;

/// Parameters of the per-cell spike extraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpikePursuitConfig {
    /// Side (pixels) of the square dilation of the ROI that defines the crop.
    #[serde(default = "default_context_size")]
    pub context_size: usize,
    /// Radius (pixels) of the disk around the ROI excluded from the background pool.
    #[serde(default = "default_censor_size")]
    pub censor_size: usize,
    /// Rank of the background basis.
    #[serde(default = "default_n_pc_bg")]
    pub n_pc_bg: usize,
    /// Drift time constant (seconds); slower signals are removed.
    #[serde(default = "default_tau_lp")]
    pub tau_lp: f64,
    /// Time constant (seconds) of the predictor high-pass, when enabled.
    #[serde(default = "default_tau_pred")]
    pub tau_pred: f64,
    /// Candidate spatial blur scales (pixels).
    #[serde(default = "default_sigmas")]
    pub sigmas: Vec<f64>,
    /// Number of refinement iterations.
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
    /// Pick blur scale and ridge penalty by cross-validation.
    #[serde(default)]
    pub do_cross_val: bool,
    /// Regress out the mean background trace on the final iteration.
    #[serde(default)]
    pub do_global_subtract: bool,
    /// Regress on a separately high-passed predictor and skip its edge frames.
    #[serde(default)]
    pub high_pass_regression: bool,
    /// Frame rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    /// Index into `sigmas` used without cross-validation.
    #[serde(default = "default_sigma_index")]
    pub sigma_index: usize,
    /// Index into the ridge penalty grid used without cross-validation.
    #[serde(default = "default_lambda_index")]
    pub lambda_index: usize,
    /// Spike clip limit of the initial denoising pass.
    #[serde(default = "default_initial_clip")]
    pub initial_clip: usize,
    /// Spike clip limit of the denoising passes inside the refinement loop.
    #[serde(default = "default_refine_clip")]
    pub refine_clip: usize,
    /// Number of contiguous folds for cross-validation.
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
}

fn default_context_size() -> usize {
    DEFAULT_CONTEXT_SIZE
}
fn default_censor_size() -> usize {
    DEFAULT_CENSOR_SIZE
}
fn default_n_pc_bg() -> usize {
    DEFAULT_N_PC_BG
}
fn default_tau_lp() -> f64 {
    DEFAULT_TAU_LP
}
fn default_tau_pred() -> f64 {
    DEFAULT_TAU_PRED
}
fn default_sigmas() -> Vec<f64> {
    DEFAULT_SIGMAS.to_vec()
}
fn default_n_iter() -> usize {
    DEFAULT_N_ITER
}
fn default_sample_rate() -> f64 {
    DEFAULT_SAMPLE_RATE
}
fn default_sigma_index() -> usize {
    DEFAULT_SIGMA_INDEX
}
fn default_lambda_index() -> usize {
    DEFAULT_LAMBDA_INDEX
}
fn default_initial_clip() -> usize {
    DEFAULT_INITIAL_CLIP
}
fn default_refine_clip() -> usize {
    DEFAULT_REFINE_CLIP
}
fn default_cv_folds() -> usize {
    DEFAULT_CV_FOLDS
}

impl Default for SpikePursuitConfig {
    fn default() -> Self {
        Self {
            context_size: DEFAULT_CONTEXT_SIZE,
            censor_size: DEFAULT_CENSOR_SIZE,
            n_pc_bg: DEFAULT_N_PC_BG,
            tau_lp: DEFAULT_TAU_LP,
            tau_pred: DEFAULT_TAU_PRED,
            sigmas: DEFAULT_SIGMAS.to_vec(),
            n_iter: DEFAULT_N_ITER,
            do_cross_val: false,
            do_global_subtract: false,
            high_pass_regression: false,
            sample_rate: DEFAULT_SAMPLE_RATE,
            sigma_index: DEFAULT_SIGMA_INDEX,
            lambda_index: DEFAULT_LAMBDA_INDEX,
            initial_clip: DEFAULT_INITIAL_CLIP,
            refine_clip: DEFAULT_REFINE_CLIP,
            cv_folds: DEFAULT_CV_FOLDS,
        }
    }
}

impl SpikePursuitConfig {
    /// Template half-width in samples.
    pub fn half_window(&self) -> usize {
        half_window(self.sample_rate)
    }

    /// Leading and trailing frames excluded from the regression rows.
    pub fn regression_margins(&self) -> (usize, usize) {
        if self.high_pass_regression {
            let head = (self.sample_rate / 2.0 + 1.0) as usize;
            let tail = (self.sample_rate / 2.0) as usize + 1;
            (head, tail)
        } else {
            (0, 0)
        }
    }

    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(SpikePursuitError::InvalidConfig(msg));
        if !(self.sample_rate > 0.0) || !self.sample_rate.is_finite() {
            return fail(format!("sample_rate must be positive, got {}", self.sample_rate));
        }
        if self.half_window() == 0 {
            return fail(format!(
                "sample_rate {} gives an empty template window",
                self.sample_rate
            ));
        }
        for (name, tau) in [("tau_lp", self.tau_lp), ("tau_pred", self.tau_pred)] {
            if !(tau > 0.0) {
                return fail(format!("{name} must be positive, got {tau}"));
            }
            // Cutoff 1/tau must stay below Nyquist.
            if 1.0 / tau >= self.sample_rate / 2.0 {
                return fail(format!(
                    "{name} = {tau} s puts the high-pass cutoff above Nyquist at {} Hz",
                    self.sample_rate
                ));
            }
        }
        if self.sigmas.is_empty() || self.sigmas.iter().any(|&s| !(s > 0.0)) {
            return fail("sigmas must be a non-empty list of positive scales".into());
        }
        if self.sigma_index >= self.sigmas.len() {
            return fail(format!(
                "sigma_index {} is out of range for {} sigmas",
                self.sigma_index,
                self.sigmas.len()
            ));
        }
        if self.lambda_index >= RIDGE_LAMBDA_SCALES.len() {
            return fail(format!(
                "lambda_index {} is out of range for {} penalties",
                self.lambda_index,
                RIDGE_LAMBDA_SCALES.len()
            ));
        }
        if self.n_iter == 0 {
            return fail("n_iter must be at least 1".into());
        }
        if self.context_size == 0 {
            return fail("context_size must be at least 1".into());
        }
        if self.do_cross_val && self.cv_folds < 2 {
            return fail(format!("cv_folds must be at least 2, got {}", self.cv_folds));
        }
        Ok(())
    }
}
