use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::denoise::DenoisedTrace;
use crate::error::ErrorKind;
use crate::roi::BoundingBox;
use crate::trace::{SpikeTrain, Template};

/// Per-cell processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellStage {
    Reading,
    InitialEstimate,
    CrossValidation,
    Iteration(usize),
    Finalizing,
}

impl std::fmt::Display for CellStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading => write!(f, "Reading context crop"),
            Self::InitialEstimate => write!(f, "Initial trace estimate"),
            Self::CrossValidation => write!(f, "Cross-validating spatial filter"),
            Self::Iteration(i) => write!(f, "Refinement iteration {i}"),
            Self::Finalizing => write!(f, "Finalizing"),
        }
    }
}

/// Thread-safe progress reporting for cell processing.
///
/// Cells run concurrently, so every call carries the cell id. All methods
/// have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A batch of `total_cells` cells is starting.
    fn begin_batch(&self, _total_cells: usize) {}

    /// A cell entered a new stage.
    fn stage(&self, _cell_id: usize, _stage: CellStage) {}

    /// A cell finished, successfully or not.
    fn finish_cell(&self, _cell_id: usize, _success: bool) {}

    /// Every cell of the batch has finished.
    fn finish_batch(&self) {}
}

/// No-op progress reporter.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// State threaded through the refinement loop; each iteration returns a new one.
#[derive(Clone, Debug)]
pub struct IterationState {
    /// Trace in the polarity of the recording (spikes negative-going).
    pub trace: Array1<f64>,
    /// Denoising of the negated trace (spikes positive-going).
    pub denoised: DenoisedTrace,
    /// Blurred non-intercept regression weights over the crop.
    pub spatial_filter: Array2<f64>,
    /// Regression weights, intercept first. Empty before the first iteration.
    pub weights: Array1<f64>,
    pub snr: f64,
}

impl IterationState {
    pub fn spike_count(&self) -> usize {
        self.denoised.spikes.len()
    }
}

/// Estimates obtained from the plain ROI average before any refinement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawRoiRecord {
    /// Background-subtracted ROI mean trace.
    pub trace: Array1<f64>,
    /// Denoised trace, same polarity as `trace`.
    pub denoised: Array1<f64>,
    pub spike_times: SpikeTrain,
    /// The ROI itself, acting as the spatial filter.
    pub spatial_mask: Array2<bool>,
    pub false_pos_rate: f64,
    pub detection_rate: f64,
    pub template: Template,
    pub snr: f64,
    pub dff: Array1<f64>,
}

/// Everything produced for one cell.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultRecord {
    pub cell_id: usize,
    /// Temporal mean of the context crop.
    pub mean_image: Array2<f64>,
    pub raw_roi: RawRoiRecord,
    /// Refined trace, same polarity as the recording.
    pub trace: Array1<f64>,
    /// Denoised refined trace, same polarity as `trace`.
    pub denoised: Array1<f64>,
    /// Context crop in frame coordinates.
    pub roi_bbox: BoundingBox,
    /// ROI mask within the crop.
    pub roi_mask: Array2<bool>,
    pub spatial_filter: Array2<f64>,
    pub false_pos_rate: f64,
    pub detection_rate: f64,
    pub template: Template,
    pub spike_times: SpikeTrain,
    /// Background basis (frames x rank).
    pub background_basis: Array2<f64>,
    /// Whether the initial detection needed the minimum-count fallback.
    pub low_spikes: bool,
    pub passed_locality_test: bool,
    pub snr: f64,
    pub f0: Array1<f64>,
    pub dff: Array1<f64>,
    /// Spike count of the raw pass followed by one entry per iteration.
    pub num_spikes: Vec<usize>,
    pub weights: Array1<f64>,
    pub sigma: f64,
    pub lambda: f64,
    /// Held-out errors `[sigma][lambda]` when cross-validation ran.
    pub cv_errors: Option<Vec<Vec<f64>>>,
}

/// A cell that could not be processed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellFailure {
    pub cell_id: usize,
    pub kind: ErrorKind,
    pub message: String,
}

impl std::fmt::Display for CellFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cell {}: {} ({})", self.cell_id, self.message, self.kind)
    }
}
