//! Engine and worker-pool errors.

use thiserror::Error;
use weave_common::TransportError;
use weave_crs::CrsError;
use weave_planner::PlanError;
use weave_raster::RasterError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Enqueue attempted after shutdown began.
    #[error("worker pool is closed")]
    Closed,

    /// The task was dropped before producing a result.
    #[error("worker pool task was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to write file: {0}")]
    FileWrite(String),

    #[error("mosaic tiles disagree on pixel dimensions")]
    MosaicPixelDimensionMismatch,

    #[error(transparent)]
    RasterBackend(#[from] RasterError),

    #[error(transparent)]
    Crs(#[from] CrsError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    /// No tile in the plan could be downloaded.
    #[error("no tile could be downloaded")]
    NoTilesDownloaded,
}
