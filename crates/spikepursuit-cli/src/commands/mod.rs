pub mod config;
pub mod info;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use spikepursuit_core::io::{PixelType, RawVideoReader};

/// Location and layout of a headerless raw recording.
#[derive(Args)]
pub struct VideoArgs {
    /// Raw recording (little-endian, frame-major, row-major frames)
    pub video: PathBuf,

    /// Frame height in pixels
    #[arg(long)]
    pub height: usize,

    /// Frame width in pixels
    #[arg(long)]
    pub width: usize,

    /// Sample type: u8, u16 or f32
    #[arg(long, default_value = "u16")]
    pub dtype: PixelType,
}

impl VideoArgs {
    pub fn open(&self) -> Result<RawVideoReader> {
        RawVideoReader::open(&self.video, self.height, self.width, self.dtype)
            .with_context(|| format!("Failed to open recording {}", self.video.display()))
    }
}
