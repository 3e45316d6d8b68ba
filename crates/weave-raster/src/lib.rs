//! Raster backend: the minimal raster-library contract the engine needs,
//! plus the GDAL implementation.

pub mod backend;
pub mod error;
pub mod gdal_backend;

pub use backend::{RasterBackend, RasterImage};
pub use error::RasterError;
pub use gdal_backend::GdalBackend;
