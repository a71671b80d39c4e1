use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use spikepursuit_core::consts::DEFAULT_SAMPLE_RATE;
use spikepursuit_core::io::{load_mask, VideoSource};
use spikepursuit_core::roi::BoundingBox;

use super::VideoArgs;

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub video: VideoArgs,

    /// Frame rate in Hz, used for the duration estimate
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: f64,

    /// ROI mask images to summarize
    #[arg(short, long = "mask")]
    pub masks: Vec<PathBuf>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let reader = args.video.open()?;
    let (frames, height, width) = reader.dims();

    println!("File:        {}", args.video.video.display());
    println!("Frames:      {}", frames);
    println!("Dimensions:  {}x{}", width, height);
    println!("Pixel type:  {}", reader.pixel_type());
    println!("Duration:    {:.2} s at {} Hz", frames as f64 / args.sample_rate, args.sample_rate);

    let total_bytes = frames * height * width * reader.pixel_type().bytes_per_sample();
    let total_mb = total_bytes as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    for (id, path) in args.masks.iter().enumerate() {
        let mask = load_mask(path)
            .with_context(|| format!("Failed to load mask {}", path.display()))?;
        let pixels = mask.iter().filter(|&&m| m).count();
        let extent = match BoundingBox::of_mask(&mask) {
            Some(b) => format!(
                "rows {}..={}, cols {}..={}",
                b.top, b.bottom, b.left, b.right
            ),
            None => "empty".to_string(),
        };
        let shape_note = if mask.dim() == (height, width) {
            ""
        } else {
            " (shape differs from frames)"
        };
        println!(
            "Cell {:<7} {} px, {}{}  [{}]",
            id,
            pixels,
            extent,
            shape_note,
            path.display()
        );
    }

    Ok(())
}
