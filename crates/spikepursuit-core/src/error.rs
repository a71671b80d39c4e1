use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpikePursuitError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid raw video: {0}")]
    InvalidVideo(String),

    #[error("ROI mask is {mask_height}x{mask_width} but video frames are {height}x{width}")]
    DimensionMismatch {
        mask_height: usize,
        mask_width: usize,
        height: usize,
        width: usize,
    },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Region out of range: {0}")]
    RegionOutOfRange(String),
}

impl SpikePursuitError {
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateInput(msg.into())
    }

    /// Coarse classification used in per-cell failure records.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::ImageError(_) | Self::InvalidVideo(_) => ErrorKind::Io,
            Self::DimensionMismatch { .. } | Self::RegionOutOfRange(_) => {
                ErrorKind::DimensionMismatch
            }
            Self::DegenerateInput(_) => ErrorKind::DegenerateInput,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

/// Error category carried by a failed cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Io,
    DimensionMismatch,
    DegenerateInput,
    InvalidConfig,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O"),
            Self::DimensionMismatch => write!(f, "Dimension mismatch"),
            Self::DegenerateInput => write!(f, "Degenerate input"),
            Self::InvalidConfig => write!(f, "Invalid config"),
        }
    }
}

pub type Result<T> = std::result::Result<T, SpikePursuitError>;
