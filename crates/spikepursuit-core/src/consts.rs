/// Minimum pixel count (columns of a frames x pixels matrix) to filter pixels in parallel.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 64;

/// Minimum frame count to blur frames in parallel.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Number of grid points used to evaluate the peak-height density.
pub const THRESHOLD_GRID_POINTS: usize = 2001;

/// Fraction of the peak-height range added on each side of the density grid.
pub const THRESHOLD_GRID_MARGIN: f64 = 0.05;

/// Minimum number of spikes accepted before the percentile fallback kicks in.
pub const MIN_SPIKE_COUNT: usize = 30;

/// `pnorm` used for the provisional threshold on the high-passed trace.
pub const PROVISIONAL_PNORM: f64 = 0.25;

/// `pnorm` used for the final threshold on the matched-filter output.
pub const FINAL_PNORM: f64 = 0.5;

/// Cutoff (Hz) of the first-order high-pass applied before provisional detection.
pub const DENOISE_HIGHPASS_HZ: f64 = 1.0;

/// Order of the Butterworth filter used for drift removal on the video.
pub const VIDEO_HIGHPASS_ORDER: usize = 3;

/// Template half-width in seconds (half-window = round(sample_rate * this)).
pub const TEMPLATE_HALF_WIDTH_S: f64 = 0.02;

/// Welch segment length for the noise power spectrum.
pub const WELCH_SEGMENT_LEN: usize = 1000;

/// Ridge penalties relative to the squared Frobenius norm of the predictor.
pub const RIDGE_LAMBDA_SCALES: [f64; 3] = [1e-4, 1e-3, 1e-2];

/// Extra columns carried by the randomized subspace iteration beyond the requested rank.
pub const SUBSPACE_OVERSAMPLING: usize = 8;

/// Upper bound on subspace iterations before giving up on convergence.
pub const SUBSPACE_MAX_ITERATIONS: usize = 300;

/// Relative change of the leading singular values below which the subspace
/// iteration stops.
pub const SUBSPACE_TOLERANCE: f64 = 1e-10;

/// Background matrices whose smaller side is at most this many are
/// decomposed exactly through their Gram matrix.
pub const EXACT_BASIS_MAX_DIM: usize = 1024;

/// Seed for the Gaussian start block of the subspace iteration.
pub const SUBSPACE_SEED: u64 = 0x5eed_b9c0;

/// Default square dilation side (pixels) defining the context crop.
pub const DEFAULT_CONTEXT_SIZE: usize = 50;

/// Default disk radius (pixels) censored from the background pool.
pub const DEFAULT_CENSOR_SIZE: usize = 12;

/// Default background basis rank.
pub const DEFAULT_N_PC_BG: usize = 8;

/// Default drift time constant (seconds).
pub const DEFAULT_TAU_LP: f64 = 3.0;

/// Default predictor high-pass time constant (seconds).
pub const DEFAULT_TAU_PRED: f64 = 1.0;

/// Default candidate spatial blur scales (pixels).
pub const DEFAULT_SIGMAS: [f64; 3] = [1.0, 1.5, 2.0];

/// Default number of refinement iterations.
pub const DEFAULT_N_ITER: usize = 5;

/// Default video frame rate (Hz).
pub const DEFAULT_SAMPLE_RATE: f64 = 400.0;

/// Default index into `sigmas` when cross-validation is off.
pub const DEFAULT_SIGMA_INDEX: usize = 1;

/// Default index into the ridge penalty grid when cross-validation is off.
pub const DEFAULT_LAMBDA_INDEX: usize = 2;

/// Spike clip limit for the initial (raw trace) template.
pub const DEFAULT_INITIAL_CLIP: usize = 100;

/// Spike clip limit for templates built during refinement.
pub const DEFAULT_REFINE_CLIP: usize = 150;

/// Default number of contiguous folds for cross-validation.
pub const DEFAULT_CV_FOLDS: usize = 3;
