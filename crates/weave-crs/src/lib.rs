//! Coordinate reference system substrate.
//!
//! Resolution of opaque CRS identifiers into immutable, shareable CRS facts
//! (identity, axis order, units, validity areas), a process-wide cache, and
//! grid-sampled coordinate / bounding-box transforms.
//!
//! Live GDAL objects (`SpatialRef`, `CoordTransform`) are rebuilt per thread
//! from the stored WKT and memoized by `(src_uid, dst_uid)`; only plain data
//! crosses thread boundaries.

pub mod crs;
pub mod error;
pub mod registry;
pub mod transform;
pub mod valid_area;

mod fnv;

pub use crs::{AxisPolicy, Crs, LonLatSegment};
pub use error::CrsError;
pub use registry::CrsRegistry;
pub use transform::{transform_bounding_box, transform_point, transform_points_partial};
