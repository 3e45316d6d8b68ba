//! Raster backend errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("raster backend failure: {0}")]
    Backend(String),

    #[error("unsupported band count: {0}")]
    UnsupportedBandCount(usize),

    #[error("warp produced no valid output extent")]
    EmptyWarpExtent,

    #[error("pixel buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },
}

impl From<gdal::errors::GdalError> for RasterError {
    fn from(err: gdal::errors::GdalError) -> Self {
        RasterError::Backend(err.to_string())
    }
}
