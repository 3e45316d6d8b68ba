//! CRS error taxonomy.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CrsError {
    /// No backend parse succeeded for the given definition.
    #[error("unknown CRS: {0}")]
    Unknown(String),

    /// The authority metadata does not declare an axis order.
    #[error("axis order unknown for CRS: {0}")]
    AxisOrderUnknown(String),

    /// A coordinate or bounding-box transform failed.
    #[error("transform failure: {0}")]
    TransformFailure(String),

    /// The source rectangle does not intersect the source CRS validity area.
    #[error("geometry lies outside the CRS validity area")]
    OutsideValidArea,
}

pub type CrsResult<T> = Result<T, CrsError>;
