pub mod consts;
pub mod denoise;
pub mod detection;
pub mod error;
pub mod filters;
pub mod io;
pub mod pipeline;
pub mod regression;
pub mod roi;
pub mod spectral;
pub mod stats;
pub mod trace;
