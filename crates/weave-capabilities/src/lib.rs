//! Capabilities fetching and parsing.
//!
//! Normalizes the WMS 1.1.1, WMS 1.3.0 and WMTS 1.0.0 capabilities dialects
//! into one in-memory [`model::ServiceModel`]. Element prefixes (`wms:`,
//! `ows:`, `sld:`) are stripped in exactly one place — the XML tree fold —
//! so the semantic parser and everything downstream see a single schema.

pub mod adviser;
pub mod error;
pub mod fetch;
pub mod model;
pub mod parser;

mod xmltree;

pub use adviser::CrsAdviser;
pub use error::CapabilitiesError;
pub use fetch::{fetch_capabilities_xml, normalize_capabilities_url};
pub use model::{
    DcpHttp, LayerIndex, LayerTreeNode, MatrixSetLink, MetadataUrl, Operation, OperationSet,
    ServiceMetadata, ServiceModel, TileMatrix, TileMatrixLimits, TileMatrixSet, WmsLayer,
    WmsLegendUrl, WmsStyle, WmtsLegendUrl, WmtsStyle, WmtsTileLayer,
};
pub use parser::parse_capabilities;
