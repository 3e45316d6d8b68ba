//! Process-wide CRS resolution cache.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use gdal::spatial_ref::SpatialRef;
use tracing::{debug, warn};

use crate::crs::{AreaOfUseBounds, AxisPolicy, Crs, CrsData, CrsKind};
use crate::error::{CrsError, CrsResult};
use crate::fnv::fnv1a64;

/// Meters per degree of latitude on the WGS84 sphere; the per-unit scale
/// used for geographic tile matrices.
pub const METERS_PER_DEGREE: f64 = 111319.49079327358;

static CACHE: OnceLock<RwLock<HashMap<String, Option<Crs>>>> = OnceLock::new();

fn cache() -> &'static RwLock<HashMap<String, Option<Crs>>> {
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Resolver facade over the process-wide cache. Stateless; construct freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrsRegistry;

impl CrsRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Resolve an opaque identifier or definition: `EPSG:<n>`, `CRS:84`,
    /// raw WKT, PROJJSON, `urn:ogc:def:crs:EPSG:…:<n>`, or user input.
    /// Idempotent; results (including failures) are cached per trimmed input.
    pub fn resolve(&self, definition: &str) -> CrsResult<Crs> {
        let key = definition.trim();
        if key.is_empty() {
            return Err(CrsError::Unknown(String::from("empty definition")));
        }

        if let Some(cached) = cache().read().expect("crs cache poisoned").get(key) {
            return cached
                .clone()
                .ok_or_else(|| CrsError::Unknown(key.to_string()));
        }

        let resolved = build_crs(key);
        let entry = resolved.as_ref().ok().cloned();
        cache()
            .write()
            .expect("crs cache poisoned")
            .insert(key.to_string(), entry);
        if let Err(err) = &resolved {
            debug!(definition = key, error = %err, "CRS resolution failed");
        }
        resolved
    }

    /// Canonical `AUTH:CODE` for a definition, when one exists.
    pub fn canonical_code(&self, definition: &str) -> Option<String> {
        self.resolve(definition).ok()?.authority_code()
    }

    /// Whether the authority declares lat/long or northing/easting order.
    /// Unresolvable definitions answer `false`, matching the permissive
    /// behavior capabilities parsing needs.
    pub fn axis_should_invert(&self, definition: &str) -> bool {
        self.resolve(definition)
            .map(|crs| crs.axis_should_invert())
            .unwrap_or(false)
    }

    /// Resolver-aware bounding-box equivalence: identifiers resolve to the
    /// same CRS and the rectangles are equal.
    pub fn bboxes_equivalent(
        &self,
        a: &weave_common::BoundingBox,
        b: &weave_common::BoundingBox,
    ) -> bool {
        let (Ok(ca), Ok(cb)) = (self.resolve(&a.crs_id), self.resolve(&b.crs_id)) else {
            return false;
        };
        ca == cb && a.rect == b.rect
    }

    /// WGS84 geographic (EPSG:4326).
    pub fn wgs84(&self) -> CrsResult<Crs> {
        self.resolve("EPSG:4326")
    }

    /// Web Mercator (EPSG:3857).
    pub fn web_mercator(&self) -> CrsResult<Crs> {
        self.resolve("EPSG:3857")
    }

    /// WKT serialization of an `EPSG:<n>` code, when it resolves.
    pub fn epsg_to_wkt(&self, epsg_code: &str) -> Option<String> {
        let crs = self.resolve(epsg_code).ok()?;
        Some(crs.wkt().to_string())
    }

    /// `EPSG:<n>` for a WKT definition, when the root authority declares one
    /// or AutoIdentifyEPSG recovers it.
    pub fn wkt_to_epsg(&self, wkt: &str) -> Option<String> {
        let crs = self.resolve(wkt).ok()?;
        let uid = crs.uid();
        uid.starts_with("EPSG:").then(|| uid.to_string())
    }

    /// Drop every cached entry. Test fixtures use this.
    pub fn clear_cache(&self) {
        cache().write().expect("crs cache poisoned").clear();
    }

    pub fn cached_count(&self) -> usize {
        cache().read().expect("crs cache poisoned").len()
    }
}

/// `urn:ogc:def:crs:EPSG:6.18:3857` style inputs: the last colon-separated
/// positive integer is the EPSG code.
pub(crate) fn urn_epsg_code(definition: &str) -> Option<u32> {
    let lower = definition.to_ascii_lowercase();
    if !lower.starts_with("urn:ogc:def") || !lower.contains("epsg") {
        return None;
    }
    let last = definition.rsplit(':').next()?;
    let code: u32 = last.parse().ok()?;
    if code == 0 {
        return None;
    }
    Some(code)
}

fn auth_pair(srs: &SpatialRef) -> Option<(String, String)> {
    let name = srs.auth_name().ok()?;
    let code = srs.auth_code().ok()?;
    Some((name, code.to_string()))
}

fn build_crs(definition: &str) -> CrsResult<Crs> {
    let srs = match SpatialRef::from_definition(definition) {
        Ok(srs) => {
            if auth_pair(&srs).is_none() {
                // No root authority; a URN form may still pin an EPSG code.
                match urn_epsg_code(definition).and_then(|code| SpatialRef::from_epsg(code).ok()) {
                    Some(by_code) => by_code,
                    None => srs,
                }
            } else {
                srs
            }
        }
        Err(_) => {
            let code = urn_epsg_code(definition)
                .ok_or_else(|| CrsError::Unknown(definition.to_string()))?;
            SpatialRef::from_epsg(code).map_err(|_| CrsError::Unknown(definition.to_string()))?
        }
    };

    extract(&srs, definition)
}

fn extract(srs: &SpatialRef, definition: &str) -> CrsResult<Crs> {
    let wkt = srs
        .to_wkt()
        .map_err(|_| CrsError::Unknown(definition.to_string()))?;

    let authority = auth_pair(srs);

    // UID: root authority EPSG code, else AutoIdentifyEPSG, else WKT hash.
    let uid = match &authority {
        Some((name, code)) if name.eq_ignore_ascii_case("EPSG") => format!("EPSG:{code}"),
        _ => {
            let mut identified = None;
            if let Ok(mut clone) = SpatialRef::from_wkt(&wkt) {
                if clone.auto_identify_epsg().is_ok() {
                    if let Some((name, code)) = auth_pair(&clone) {
                        if name.eq_ignore_ascii_case("EPSG") {
                            identified = Some(format!("EPSG:{code}"));
                        }
                    }
                }
            }
            identified.unwrap_or_else(|| format!("WKT2_2018_HASH:{:016x}", fnv1a64(wkt.as_bytes())))
        }
    };

    let kind = if srs.is_geographic() {
        CrsKind::Geographic
    } else if srs.is_projected() {
        CrsKind::Projected
    } else {
        CrsKind::Local
    };

    let authority_lat_first = first_axis_is_north(srs, kind);

    let area_of_use = srs.area_of_use().map(|area| AreaOfUseBounds {
        west: area.west_lon_degree,
        south: area.south_lat_degree,
        east: area.east_lon_degree,
        north: area.north_lat_degree,
    });
    if area_of_use.is_none() {
        warn!(definition, "CRS has no declared area of use");
    }

    // Every angular CRS this pipeline meets measures in degrees; PROJ
    // normalizes exotic angular units away during WKT import.
    let angular_to_radians = if kind == CrsKind::Geographic {
        std::f64::consts::PI / 180.0
    } else {
        1.0
    };

    let data = CrsData {
        uid,
        wkt,
        authority,
        kind,
        linear_to_meters: srs.linear_units(),
        angular_to_radians,
        authority_lat_first,
        area_of_use,
        axis_policy: AxisPolicy::TraditionalGis,
    };
    Ok(Crs::from_data(data))
}

/// The authority declares lat/long (geographic) or northing/easting
/// (projected) exactly when the first axis of the definition points north.
fn first_axis_is_north(srs: &SpatialRef, kind: CrsKind) -> bool {
    let target_key = match kind {
        CrsKind::Geographic => "GEOGCS",
        CrsKind::Projected => "PROJCS",
        CrsKind::Local => return false,
    };
    match srs.axis_orientation(target_key, 0) {
        Ok(orientation) => orientation == gdal_sys::OGRAxisOrientation::OAO_North,
        Err(_) => false,
    }
}
