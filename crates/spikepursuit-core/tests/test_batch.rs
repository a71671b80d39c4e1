mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ndarray::Array2;

use spikepursuit_core::error::ErrorKind;
use spikepursuit_core::io::InMemoryVideo;
use spikepursuit_core::pipeline::{
    run_cells, run_cells_reported, CellSpec, CellStage, ProgressReporter, RayonExecutor,
    SequentialExecutor, SpikePursuitConfig,
};

use common::{synthetic_movie, MovieSpec};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn batch_config() -> SpikePursuitConfig {
    SpikePursuitConfig {
        context_size: 50,
        censor_size: 3,
        n_pc_bg: 4,
        n_iter: 1,
        ..Default::default()
    }
}

fn small_movie() -> common::Movie {
    synthetic_movie(&MovieSpec {
        frames: 3000,
        spike_spacing: 56,
        ..Default::default()
    })
}

#[derive(Default)]
struct CountingReporter {
    batches: AtomicUsize,
    finished_ok: AtomicUsize,
    finished_err: AtomicUsize,
    batch_done: AtomicUsize,
    iterations: Mutex<Vec<(usize, CellStage)>>,
}

impl ProgressReporter for CountingReporter {
    fn begin_batch(&self, total_cells: usize) {
        self.batches.fetch_add(total_cells, Ordering::SeqCst);
    }

    fn stage(&self, cell_id: usize, stage: CellStage) {
        if matches!(stage, CellStage::Iteration(_)) {
            self.iterations.lock().unwrap().push((cell_id, stage));
        }
    }

    fn finish_cell(&self, _cell_id: usize, success: bool) {
        if success {
            self.finished_ok.fetch_add(1, Ordering::SeqCst);
        } else {
            self.finished_err.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn finish_batch(&self) {
        self.batch_done.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Batch processing
// ---------------------------------------------------------------------------

#[test]
fn test_batch_isolates_failing_cell() {
    let movie = small_movie();
    let video = InMemoryVideo::new(movie.video);
    let cells = vec![
        CellSpec {
            cell_id: 7,
            mask: movie.mask.clone(),
        },
        CellSpec {
            cell_id: 2,
            mask: Array2::from_elem((9, 9), true),
        },
        CellSpec {
            cell_id: 4,
            mask: Array2::from_elem((16, 16), false),
        },
    ];

    let executor = RayonExecutor::new(2).unwrap();
    assert_eq!(executor.threads(), 2);
    let reporter = CountingReporter::default();
    let results = run_cells_reported(&video, &cells, &batch_config(), &executor, &reporter).unwrap();

    assert_eq!(results.keys().copied().collect::<Vec<_>>(), vec![2, 4, 7]);

    let ok = results[&7].as_ref().unwrap();
    assert_eq!(ok.cell_id, 7);
    assert!(common::recall(&movie.spikes, ok.spike_times.indices(), 1) >= 0.9);

    let mismatch = results[&2].as_ref().unwrap_err();
    assert_eq!(mismatch.cell_id, 2);
    assert_eq!(mismatch.kind, ErrorKind::DimensionMismatch);
    assert!(mismatch.message.contains("9x9"));

    let empty = results[&4].as_ref().unwrap_err();
    assert_eq!(empty.kind, ErrorKind::DegenerateInput);

    assert_eq!(reporter.batches.load(Ordering::SeqCst), 3);
    assert_eq!(reporter.finished_ok.load(Ordering::SeqCst), 1);
    assert_eq!(reporter.finished_err.load(Ordering::SeqCst), 2);
    assert_eq!(reporter.batch_done.load(Ordering::SeqCst), 1);
    assert_eq!(
        reporter.iterations.lock().unwrap().as_slice(),
        &[(7, CellStage::Iteration(1))]
    );
}

#[test]
fn test_batch_parallel_matches_sequential() {
    let movie = small_movie();
    let video = InMemoryVideo::new(movie.video);
    let mut shifted = Array2::from_elem((16, 16), false);
    for r in 6..9 {
        for c in 5..8 {
            shifted[[r, c]] = true;
        }
    }
    let cells = vec![
        CellSpec {
            cell_id: 0,
            mask: movie.mask.clone(),
        },
        CellSpec {
            cell_id: 1,
            mask: shifted,
        },
    ];

    let config = batch_config();
    let sequential = run_cells(&video, &cells, &config, &SequentialExecutor).unwrap();
    let parallel = run_cells(&video, &cells, &config, &RayonExecutor::new(2).unwrap()).unwrap();

    for id in [0, 1] {
        let a = sequential[&id].as_ref().unwrap();
        let b = parallel[&id].as_ref().unwrap();
        assert_eq!(a.spike_times, b.spike_times, "cell {id}");
        assert_eq!(a.trace, b.trace, "cell {id}");
        assert_eq!(a.spatial_filter, b.spatial_filter, "cell {id}");
    }
}

#[test]
fn test_batch_invalid_config_fails_whole_batch() {
    let movie = synthetic_movie(&MovieSpec {
        frames: 200,
        ..Default::default()
    });
    let video = InMemoryVideo::new(movie.video);
    let cells = vec![CellSpec {
        cell_id: 0,
        mask: movie.mask,
    }];
    let config = SpikePursuitConfig {
        sigmas: vec![],
        ..batch_config()
    };
    let err = run_cells(&video, &cells, &config, &SequentialExecutor).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}

#[test]
fn test_batch_with_no_cells() {
    let movie = synthetic_movie(&MovieSpec {
        frames: 100,
        ..Default::default()
    });
    let video = InMemoryVideo::new(movie.video);
    let results = run_cells(&video, &[], &batch_config(), &SequentialExecutor).unwrap();
    assert!(results.is_empty());
}
