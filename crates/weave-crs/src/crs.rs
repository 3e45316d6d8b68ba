//! Resolved CRS value type.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// How coordinates handed to and returned from this library are ordered.
///
/// `TraditionalGis` is the default everywhere: X is longitude/easting, Y is
/// latitude/northing, whatever the authority says. `AuthorityCompliant`
/// follows the authority's declared order. `Unknown` is reported when the
/// authority metadata carries no axis information at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisPolicy {
    TraditionalGis,
    AuthorityCompliant,
    Unknown,
}

/// One lon/lat segment of a CRS validity area, in CRS:84 axis meaning.
/// Invariant: `west <= east`. An area crossing the antimeridian is expressed
/// as two segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLatSegment {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

/// Area-of-use bounds exactly as the authority declares them (west may
/// exceed east across the antimeridian).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaOfUseBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrsKind {
    Geographic,
    Projected,
    Local,
}

/// Immutable facts extracted from a resolved spatial reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrsData {
    /// Canonical UID: `EPSG:<n>` or `WKT2_2018_HASH:<fnv1a64-hex>`.
    pub uid: String,
    /// WKT serialization; live transform objects are rebuilt from this.
    pub wkt: String,
    /// Root authority (name, code) when declared, e.g. `("EPSG", "3857")`.
    pub authority: Option<(String, String)>,
    pub kind: CrsKind,
    /// Multiply a linear coordinate by this to get meters.
    pub linear_to_meters: f64,
    /// Multiply an angular coordinate by this to get radians.
    pub angular_to_radians: f64,
    /// Authority declares this CRS lat/long (geographic) or
    /// northing/easting (projected).
    pub authority_lat_first: bool,
    pub area_of_use: Option<AreaOfUseBounds>,
    pub axis_policy: AxisPolicy,
}

/// A resolved CRS. Cheap to clone and share across threads.
#[derive(Debug, Clone)]
pub struct Crs {
    data: Arc<CrsData>,
}

impl Crs {
    pub fn from_data(data: CrsData) -> Self {
        Self {
            data: Arc::new(data),
        }
    }

    pub fn uid(&self) -> &str {
        &self.data.uid
    }

    pub fn wkt(&self) -> &str {
        &self.data.wkt
    }

    pub fn authority(&self) -> Option<(&str, &str)> {
        self.data
            .authority
            .as_ref()
            .map(|(n, c)| (n.as_str(), c.as_str()))
    }

    /// `AUTH:CODE` when the authority is declared, e.g. `EPSG:3857`.
    pub fn authority_code(&self) -> Option<String> {
        self.authority().map(|(n, c)| format!("{n}:{c}"))
    }

    pub fn is_geographic(&self) -> bool {
        self.data.kind == CrsKind::Geographic
    }

    pub fn is_projected(&self) -> bool {
        self.data.kind == CrsKind::Projected
    }

    pub fn is_local(&self) -> bool {
        self.data.kind == CrsKind::Local
    }

    pub fn linear_to_meters(&self) -> f64 {
        self.data.linear_to_meters
    }

    pub fn angular_to_radians(&self) -> f64 {
        self.data.angular_to_radians
    }

    /// Geographic CRSes measure in degrees of latitude; everything else in
    /// its linear unit.
    pub fn meters_per_unit(&self) -> f64 {
        if self.is_geographic() {
            crate::registry::METERS_PER_DEGREE
        } else {
            self.data.linear_to_meters
        }
    }

    /// True when the authority declares the CRS lat/long or northing/easting,
    /// i.e. coordinate pairs in on-the-wire contexts honoring the authority
    /// order must be swapped relative to traditional GIS order.
    pub fn axis_should_invert(&self) -> bool {
        self.data.authority_lat_first
    }

    pub fn axis_policy(&self) -> AxisPolicy {
        self.data.axis_policy
    }

    pub fn area_of_use(&self) -> Option<AreaOfUseBounds> {
        self.data.area_of_use
    }
}

impl PartialEq for Crs {
    /// UIDs are content-derived (authority code or WKT hash), so UID equality
    /// is the identity criterion.
    fn eq(&self, other: &Self) -> bool {
        self.data.uid == other.data.uid
    }
}

impl Eq for Crs {}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.data.uid)
    }
}
