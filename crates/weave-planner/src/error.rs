//! Planner error taxonomy. All of these are non-fatal to the caller.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// No CRS could be chosen or resolved for the layer.
    #[error("no resolvable CRS for layer")]
    CrsUnresolvable,

    /// The viewport does not overlap the layer in the tile CRS.
    #[error("viewport does not overlap the layer")]
    NoViewportOverlap,

    /// No tile matrix matches the viewport density target within [0, 25].
    #[error("no usable level for the viewport")]
    LevelOutOfRange,

    /// Planning produced no tiles (collapsed range, unknown matrix set…).
    #[error("empty tile plan")]
    EmptyPlan,
}
