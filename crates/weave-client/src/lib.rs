//! Public facade over the map-weaving pipeline.
//!
//! One [`MapClient`] per service URL session: fetch the capabilities, parse
//! them, enumerate layers / formats / styles / matrix sets, plan a viewport
//! and execute the plan into a mosaic.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use weave_capabilities::{fetch_capabilities_xml, parse_capabilities, CapabilitiesError, ServiceModel};
use weave_common::{BoundingBox, ProxyConfig, Rect, TransportError};
use weave_crs::{transform_bounding_box, valid_area, CrsError, CrsRegistry};
use weave_engine::{EngineConfig, EngineError, EngineOutput, TileEngine};
use weave_http::HttpClient;
use weave_planner::{PlanError, PlanParams, Planner, PlannerConfig, TileRequest};
use weave_raster::{GdalBackend, RasterBackend};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no capabilities parsed yet")]
    NoModel,

    #[error("layer not found: {0}")]
    LayerNotFound(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Capabilities(#[from] CapabilitiesError),

    #[error(transparent)]
    Crs(#[from] CrsError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scratch directory for tiles and mosaics.
    pub temp_dir: PathBuf,
    /// Download worker count.
    pub concurrency: usize,
    /// CRS the final mosaic is delivered in.
    pub target_crs: String,
    pub proxy: Option<ProxyConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            concurrency: 6,
            target_crs: String::from("EPSG:4326"),
            proxy: None,
        }
    }
}

/// The inputs identifying one planned map request; kept so a plan can be
/// rebuilt with `use_xlink_href = true` by the engine's replan policy.
#[derive(Debug, Clone)]
pub struct PlanInputs {
    pub layer_title: String,
    pub tile_matrix_set: String,
    pub format: String,
    pub style: String,
    pub viewport: BoundingBox,
    pub service_url: String,
}

pub struct MapClient {
    http: Arc<HttpClient>,
    registry: CrsRegistry,
    backend: Arc<dyn RasterBackend>,
    config: ClientConfig,
    model: Option<ServiceModel>,
}

impl MapClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = Arc::new(HttpClient::new(config.proxy.as_ref())?);
        let backend: Arc<dyn RasterBackend> = Arc::new(GdalBackend::new());
        backend.register_drivers();
        Ok(Self {
            http,
            registry: CrsRegistry::new(),
            backend,
            config,
            model: None,
        })
    }

    /// Swap in a different raster backend (tests, alternative libraries).
    pub fn with_backend(mut self, backend: Arc<dyn RasterBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn registry(&self) -> &CrsRegistry {
        &self.registry
    }

    /// Download the capabilities XML for a service URL.
    pub async fn fetch(&self, url: &str) -> Result<String, ClientError> {
        Ok(fetch_capabilities_xml(&self.http, url).await?)
    }

    /// Parse a capabilities body and keep the model for the session.
    pub fn parse(&mut self, xml: &str) -> Result<&ServiceModel, ClientError> {
        let model = parse_capabilities(xml, &self.registry)?;
        info!(
            version = %model.version,
            wms_layers = model.wms_layers.len(),
            wmts_layers = model.wmts_layers.len(),
            matrix_sets = model.tile_matrix_sets.len(),
            "capabilities parsed"
        );
        self.model = Some(model);
        Ok(self.model.as_ref().expect("model just set"))
    }

    pub fn model(&self) -> Result<&ServiceModel, ClientError> {
        self.model.as_ref().ok_or(ClientError::NoModel)
    }

    /// Titles of the WMS root layers plus all WMTS layers, sorted.
    pub fn root_layer_titles(&self) -> Result<Vec<String>, ClientError> {
        let model = self.model()?;
        let mut titles = Vec::new();
        for tree in &model.layer_index.trees {
            if let Some(layer) = model.wms_layer_by_order_id(tree.order_id) {
                titles.push(layer.title.clone());
            }
        }
        for layer in &model.wmts_layers {
            titles.push(layer.title.clone());
        }
        titles.sort();
        Ok(titles)
    }

    /// Titles of a WMS layer's direct children, sorted. Empty for leaves
    /// and WMTS layers.
    pub fn children_layer_titles(&self, layer_title: &str) -> Result<Vec<String>, ClientError> {
        let model = self.model()?;
        let Some(layer) = model.wms_layer_by_title(layer_title) else {
            return Ok(Vec::new());
        };
        let mut titles: Vec<String> = layer.children.iter().map(|c| c.title.clone()).collect();
        titles.sort();
        Ok(titles)
    }

    pub fn is_wmts_layer(&self, layer_title: &str) -> Result<bool, ClientError> {
        Ok(self.model()?.is_wmts_layer(layer_title))
    }

    /// Image formats a layer offers. WMS layers fall back to the GetMap
    /// formats when their styles advertise no legend formats.
    pub fn layer_formats(&self, layer_title: &str) -> Result<Vec<String>, ClientError> {
        let model = self.model()?;
        if let Some(layer) = model.wms_layer_by_title(layer_title) {
            let mut formats: Vec<String> = layer
                .styles
                .iter()
                .flat_map(|s| s.legend_urls.iter().map(|l| l.format.clone()))
                .filter(|f| !f.is_empty())
                .collect();
            if formats.is_empty() {
                formats = model.request.get_map.formats.clone();
            }
            return Ok(formats);
        }
        if let Some(layer) = model.wmts_layer_by_title(layer_title) {
            return Ok(layer.formats.clone());
        }
        Err(ClientError::LayerNotFound(layer_title.to_string()))
    }

    pub fn layer_styles(&self, layer_title: &str) -> Result<Vec<String>, ClientError> {
        let model = self.model()?;
        if let Some(layer) = model.wms_layer_by_title(layer_title) {
            return Ok(layer.styles.iter().map(|s| s.name.clone()).collect());
        }
        if let Some(layer) = model.wmts_layer_by_title(layer_title) {
            let mut styles: Vec<String> = layer.styles.keys().cloned().collect();
            styles.sort();
            return Ok(styles);
        }
        Err(ClientError::LayerNotFound(layer_title.to_string()))
    }

    /// TileMatrixSet names linked by a WMTS layer, sorted. Empty for WMS.
    pub fn layer_tile_matrix_sets(&self, layer_title: &str) -> Result<Vec<String>, ClientError> {
        let model = self.model()?;
        let Some(layer) = model.wmts_layer_by_title(layer_title) else {
            return Ok(Vec::new());
        };
        let mut sets: Vec<String> = layer.matrix_set_links.keys().cloned().collect();
        sets.sort();
        Ok(sets)
    }

    /// The layer's extent in EPSG:4326 (lon/lat).
    pub fn layer_bounding_box_4326(
        &self,
        layer_title: &str,
        tile_matrix_set: &str,
    ) -> Result<BoundingBox, ClientError> {
        let model = self.model()?;

        if let Some(layer) = model.wms_layer_by_title(layer_title) {
            let rect = layer.ex_geographic_bbox;
            if rect.is_valid()
                && rect.min_x < rect.max_x
                && rect.min_y < rect.max_y
                && rect.min_x >= -180.0
                && rect.max_x <= 180.0
                && rect.min_y >= -90.0
                && rect.max_y <= 90.0
            {
                return Ok(BoundingBox::new("EPSG:4326", rect));
            }
        }

        if model.tile_matrix_sets.contains_key(tile_matrix_set) {
            let wgs84 = self.registry.resolve("EPSG:4326")?;
            if let Some(layer) = model.wmts_layer_by_title(layer_title) {
                for bbox in &layer.bounding_boxes {
                    if !bbox.is_valid() {
                        continue;
                    }
                    if let Ok(in_4326) = transform_bounding_box(
                        &self.registry,
                        bbox,
                        &wgs84,
                        weave_crs::transform::BBOX_SAMPLE_GRID,
                    ) {
                        if in_4326.rect.is_valid() {
                            return Ok(in_4326);
                        }
                    }
                }
            }
        }

        Err(ClientError::LayerNotFound(layer_title.to_string()))
    }

    /// The CRS identifier tiles for this layer live in.
    pub fn layer_crs(
        &self,
        layer_title: &str,
        tile_matrix_set: &str,
    ) -> Result<String, ClientError> {
        let model = self.model()?;
        let planner = Planner::new(model, &self.registry, self.planner_config());
        planner
            .layer_crs(layer_title, tile_matrix_set)
            .ok_or(ClientError::Plan(PlanError::CrsUnresolvable))
    }

    /// Validity area of the target CRS in lon/lat, for viewport clipping.
    pub fn target_crs_bounds_4326(&self) -> Result<BoundingBox, ClientError> {
        let crs = self.registry.resolve(&self.config.target_crs)?;
        let rect = valid_area::valid_area_lonlat(&crs)?;
        Ok(BoundingBox::new("EPSG:4326", rect))
    }

    fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            temp_dir: self.config.temp_dir.clone(),
        }
    }

    /// Plan the tile set for a viewport.
    pub fn plan(
        &self,
        inputs: &PlanInputs,
        use_xlink_href: bool,
    ) -> Result<Vec<TileRequest>, ClientError> {
        let model = self.model()?;
        let planner = Planner::new(model, &self.registry, self.planner_config());
        Ok(planner.plan(&PlanParams {
            layer_title: &inputs.layer_title,
            tile_matrix_set: &inputs.tile_matrix_set,
            format: &inputs.format,
            style: &inputs.style,
            viewport: &inputs.viewport,
            service_url: &inputs.service_url,
            use_xlink_href,
        })?)
    }

    /// Execute a plan: download, reproject, mosaic. The engine replans once
    /// against the capability endpoint when every tile came back as XML.
    pub async fn execute(
        &self,
        plan: Vec<TileRequest>,
        inputs: &PlanInputs,
    ) -> Result<EngineOutput, ClientError> {
        let model = self.model()?;
        let engine = TileEngine::new(
            Arc::clone(&self.http),
            self.registry,
            Arc::clone(&self.backend),
            EngineConfig {
                concurrency: self.config.concurrency,
                target_crs: self.config.target_crs.clone(),
            },
        );

        let registry = self.registry;
        let planner_config = self.planner_config();
        let output = engine
            .execute(plan, |use_xlink_href| {
                let planner = Planner::new(model, &registry, planner_config.clone());
                planner.plan(&PlanParams {
                    layer_title: &inputs.layer_title,
                    tile_matrix_set: &inputs.tile_matrix_set,
                    format: &inputs.format,
                    style: &inputs.style,
                    viewport: &inputs.viewport,
                    service_url: &inputs.service_url,
                    use_xlink_href,
                })
            })
            .await?;
        Ok(output)
    }

    /// Ingest the executed mosaic into a GeoPackage raster pyramid.
    pub fn write_geopackage(
        &self,
        output: &EngineOutput,
        gpkg_path: &str,
    ) -> Result<(), ClientError> {
        let engine = TileEngine::new(
            Arc::clone(&self.http),
            self.registry,
            Arc::clone(&self.backend),
            EngineConfig {
                concurrency: self.config.concurrency,
                target_crs: self.config.target_crs.clone(),
            },
        );
        engine.write_geopackage(output, gpkg_path)?;
        Ok(())
    }

    /// Clip a viewport to the intersection of the target-CRS lon/lat bounds
    /// and the layer's EPSG:4326 extent, in EPSG:4326.
    pub fn clip_viewport_4326(
        &self,
        layer_title: &str,
        tile_matrix_set: &str,
        viewport_4326: &Rect,
    ) -> Result<BoundingBox, ClientError> {
        let target_bounds = self.target_crs_bounds_4326()?;
        let layer_bounds = self.layer_bounding_box_4326(layer_title, tile_matrix_set)?;

        let map_bounds = target_bounds
            .overlap(&layer_bounds)
            .ok_or(ClientError::Plan(PlanError::NoViewportOverlap))?;
        let clipped = map_bounds
            .overlap(&BoundingBox::new("EPSG:4326", *viewport_4326))
            .ok_or(ClientError::Plan(PlanError::NoViewportOverlap))?;
        Ok(clipped)
    }
}
