use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use spikepursuit_core::io::{load_mask, VideoSource};
use spikepursuit_core::pipeline::{
    run_cells_reported, CellFailure, CellSpec, CellStage, ProgressReporter, RayonExecutor,
    ResultRecord, SpikePursuitConfig,
};
use tracing::info;

use super::VideoArgs;
use crate::summary;

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub video: VideoArgs,

    /// ROI mask images, one per cell; cell ids follow the argument order
    #[arg(short, long = "mask", required = true)]
    pub masks: Vec<PathBuf>,

    /// TOML config file (defaults are used for missing keys)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output JSON file
    #[arg(short, long, default_value = "spikes.json")]
    pub output: PathBuf,

    /// Frame rate in Hz (overrides config)
    #[arg(long)]
    pub sample_rate: Option<f64>,

    /// Refinement iterations (overrides config)
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Pick blur scale and ridge penalty by cross-validation
    #[arg(long)]
    pub cross_validate: bool,

    /// Regress out the mean background trace on the last iteration
    #[arg(long)]
    pub global_subtract: bool,

    /// Worker threads (0 = one per core)
    #[arg(short = 'j', long, default_value = "0")]
    pub threads: usize,

    /// Write compact instead of pretty-printed JSON
    #[arg(long)]
    pub compact: bool,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    video: &'a Path,
    frames: usize,
    height: usize,
    width: usize,
    config: &'a SpikePursuitConfig,
    cells: Vec<&'a ResultRecord>,
    failures: Vec<&'a CellFailure>,
}

/// Progress bar over cells; the message follows the most recent stage change.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:40} [{bar:40}] {pos}/{len} cells")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressReporter for BarReporter {
    fn begin_batch(&self, total_cells: usize) {
        self.bar.set_length(total_cells as u64);
        self.bar.set_message("Starting");
    }

    fn stage(&self, cell_id: usize, stage: CellStage) {
        self.bar.set_message(format!("cell {cell_id}: {stage}"));
    }

    fn finish_cell(&self, _cell_id: usize, _success: bool) {
        self.bar.inc(1);
    }

    fn finish_batch(&self) {
        self.bar.finish_with_message("Done");
    }
}

fn load_config(args: &RunArgs) -> Result<SpikePursuitConfig> {
    let mut config = match args.config {
        Some(ref path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => SpikePursuitConfig::default(),
    };
    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate;
    }
    if let Some(n) = args.iterations {
        config.n_iter = n;
    }
    config.do_cross_val |= args.cross_validate;
    config.do_global_subtract |= args.global_subtract;
    config.validate()?;
    Ok(config)
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;
    let reader = args.video.open()?;
    let (frames, height, width) = reader.dims();

    let cells = args
        .masks
        .iter()
        .enumerate()
        .map(|(cell_id, path)| {
            let mask = load_mask(path)
                .with_context(|| format!("Failed to load mask {}", path.display()))?;
            info!(cell_id, path = %path.display(), "Loaded ROI mask");
            Ok(CellSpec { cell_id, mask })
        })
        .collect::<Result<Vec<_>>>()?;

    let executor = RayonExecutor::new(args.threads)?;
    summary::print_run_summary(
        &args.video.video,
        (frames, height, width),
        &config,
        cells.len(),
        executor.threads(),
        &args.output,
    );

    let reporter = BarReporter::new()?;
    let results = run_cells_reported(&reader, &cells, &config, &executor, &reporter)?;

    let output = RunOutput {
        video: &args.video.video,
        frames,
        height,
        width,
        config: &config,
        cells: results.values().filter_map(|r| r.as_ref().ok()).collect(),
        failures: results.values().filter_map(|r| r.as_ref().err()).collect(),
    };
    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    if args.compact {
        serde_json::to_writer(&mut writer, &output)?;
    } else {
        serde_json::to_writer_pretty(&mut writer, &output)?;
    }
    writer.flush()?;

    summary::print_batch_summary(&results);
    println!("Saved to {}", args.output.display());

    if output.cells.is_empty() && !output.failures.is_empty() {
        anyhow::bail!("every cell failed");
    }
    Ok(())
}
