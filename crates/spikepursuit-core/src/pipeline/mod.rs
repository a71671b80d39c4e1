pub mod config;
pub mod locality;
pub mod refiner;
mod orchestrator;
mod types;

pub use config::SpikePursuitConfig;
pub use orchestrator::{
    run_cells, run_cells_reported, BatchResult, CellSpec, RayonExecutor, SequentialExecutor,
    TaskExecutor,
};
pub use refiner::SpatialTemporalRefiner;
pub use types::{
    CellFailure, CellStage, IterationState, NoOpReporter, ProgressReporter, RawRoiRecord,
    ResultRecord,
};
