use std::collections::BTreeMap;

use ndarray::Array2;
use rayon::prelude::*;
use tracing::{info, info_span, warn};

use crate::error::{Result, SpikePursuitError};
use crate::io::VideoSource;

use super::config::SpikePursuitConfig;
use super::refiner::SpatialTemporalRefiner;
use super::types::{CellFailure, NoOpReporter, ProgressReporter, ResultRecord};

/// One cell to process: an id and its ROI mask in frame coordinates.
#[derive(Clone, Debug)]
pub struct CellSpec {
    pub cell_id: usize,
    pub mask: Array2<bool>,
}

/// Outcome of every cell of a batch, keyed by cell id.
pub type BatchResult = BTreeMap<usize, std::result::Result<ResultRecord, CellFailure>>;

/// Runs independent tasks and returns their outputs in task order.
pub trait TaskExecutor {
    fn execute<T, F>(&self, tasks: Vec<F>) -> Vec<T>
    where
        T: Send,
        F: FnOnce() -> T + Send;
}

/// Runs tasks on a dedicated, bounded rayon thread pool.
pub struct RayonExecutor {
    pool: rayon::ThreadPool,
}

impl RayonExecutor {
    /// `threads == 0` lets rayon pick the number of threads.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("spikepursuit-cell-{i}"))
            .build()
            .map_err(|e| SpikePursuitError::InvalidConfig(format!("cannot build thread pool: {e}")))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl TaskExecutor for RayonExecutor {
    fn execute<T, F>(&self, tasks: Vec<F>) -> Vec<T>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        self.pool
            .install(|| tasks.into_par_iter().map(|task| task()).collect())
    }
}

/// Runs tasks one after another on the calling thread.
pub struct SequentialExecutor;

impl TaskExecutor for SequentialExecutor {
    fn execute<T, F>(&self, tasks: Vec<F>) -> Vec<T>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        tasks.into_iter().map(|task| task()).collect()
    }
}

/// Process every cell against a shared video.
///
/// An invalid configuration fails the whole batch. Any other error is caught
/// at the cell boundary and reported as that cell's [`CellFailure`].
pub fn run_cells_reported<V, E>(
    video: &V,
    cells: &[CellSpec],
    config: &SpikePursuitConfig,
    executor: &E,
    reporter: &dyn ProgressReporter,
) -> Result<BatchResult>
where
    V: VideoSource + ?Sized,
    E: TaskExecutor,
{
    let refiner = SpatialTemporalRefiner::new(config.clone())?;
    let (frames, height, width) = video.dims();
    info!(cells = cells.len(), frames, height, width, "Processing cells");
    reporter.begin_batch(cells.len());

    let refiner = &refiner;
    let tasks: Vec<_> = cells
        .iter()
        .map(|cell| {
            move || {
                let _span = info_span!("cell", cell_id = cell.cell_id).entered();
                let outcome = refiner
                    .run(cell.cell_id, video, &cell.mask, reporter)
                    .map_err(|e| {
                        warn!(error = %e, "Cell failed");
                        CellFailure {
                            cell_id: cell.cell_id,
                            kind: e.kind(),
                            message: e.to_string(),
                        }
                    });
                reporter.finish_cell(cell.cell_id, outcome.is_ok());
                (cell.cell_id, outcome)
            }
        })
        .collect();

    let results: BatchResult = executor.execute(tasks).into_iter().collect();
    reporter.finish_batch();

    let failed = results.values().filter(|r| r.is_err()).count();
    info!(succeeded = results.len() - failed, failed, "Batch complete");
    Ok(results)
}

/// Process every cell without progress reporting.
pub fn run_cells<V, E>(
    video: &V,
    cells: &[CellSpec],
    config: &SpikePursuitConfig,
    executor: &E,
) -> Result<BatchResult>
where
    V: VideoSource + ?Sized,
    E: TaskExecutor,
{
    run_cells_reported(video, cells, config, executor, &NoOpReporter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executors_preserve_task_order() {
        let tasks: Vec<_> = (0..16).map(|i| move || i * i).collect();
        let sequential = SequentialExecutor.execute(tasks);
        let tasks: Vec<_> = (0..16).map(|i| move || i * i).collect();
        let parallel = RayonExecutor::new(4).unwrap().execute(tasks);
        assert_eq!(sequential, parallel);
        assert_eq!(parallel[5], 25);
    }
}
