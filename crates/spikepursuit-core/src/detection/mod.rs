pub mod kde;
pub mod peaks;
pub mod threshold;

pub use kde::GaussianKde;
pub use peaks::{local_maxima, peaks_above};
pub use threshold::ThresholdEstimator;
