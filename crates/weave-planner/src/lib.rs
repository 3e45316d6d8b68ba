//! Tile planner: a chosen layer + viewport → an ordered list of tile
//! requests with URLs and scratch file paths.

pub mod error;
pub mod paths;
pub mod planner;
pub mod request;
pub mod urls;

pub use error::PlanError;
pub use planner::{CrsOps, PlanParams, Planner, PlannerConfig};
pub use request::TileRequest;
