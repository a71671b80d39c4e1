pub mod butterworth;
pub mod gaussian_blur;

pub use butterworth::{highpass, highpass_video, IirCoeffs};
pub use gaussian_blur::{blur_frames, gaussian_blur};
