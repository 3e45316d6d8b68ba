//! Orchestration: run a plan through the worker pool, apply the all-XML
//! replan policy once, mosaic, and reproject.

use std::sync::Arc;

use tracing::{info, warn};
use weave_crs::CrsRegistry;
use weave_http::HttpClient;
use weave_planner::{PlanError, TileRequest};
use weave_raster::RasterBackend;

use crate::download::{self, run_tile_task, TileRun};
use crate::error::EngineError;
use crate::mosaic;
use crate::pool::WorkerPool;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker count for the download pool.
    pub concurrency: usize,
    /// CRS the final mosaic is reprojected into.
    pub target_crs: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 6,
            target_crs: String::from("EPSG:4326"),
        }
    }
}

/// Everything the engine produced for one plan.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// Tile-CRS mosaic of all downloaded tiles.
    pub mosaic_path: String,
    /// The mosaic reprojected into the target CRS.
    pub reprojected_path: String,
    /// UID of the CRS the mosaic itself is georeferenced in.
    pub tile_crs_id: String,
    /// Zoom level of the plan (0 for a WMS frame).
    pub level: i32,
    /// Indices of tiles that failed, with their error messages.
    pub failures: Vec<(usize, String)>,
}

pub struct TileEngine {
    http: Arc<HttpClient>,
    registry: CrsRegistry,
    backend: Arc<dyn RasterBackend>,
    config: EngineConfig,
}

impl TileEngine {
    pub fn new(
        http: Arc<HttpClient>,
        registry: CrsRegistry,
        backend: Arc<dyn RasterBackend>,
        config: EngineConfig,
    ) -> Self {
        backend.register_drivers();
        Self {
            http,
            registry,
            backend,
            config,
        }
    }

    /// Run every tile task through the pool and collect per-index results.
    async fn run_batch(&self, plan: &[TileRequest]) -> Result<Vec<TileRun>, EngineError> {
        let pool = WorkerPool::new(self.config.concurrency);
        let cancel = pool.cancel_flag();

        let mut handles = Vec::with_capacity(plan.len());
        for (index, tile) in plan.iter().enumerate() {
            let handle = pool.enqueue(run_tile_task(
                Arc::clone(&self.http),
                self.registry,
                Arc::clone(&self.backend),
                tile.clone(),
                self.config.target_crs.clone(),
                Arc::clone(&cancel),
            ))?;
            handles.push((index, tile.clone(), handle));
        }

        pool.wait_all().await;

        let mut runs = Vec::with_capacity(handles.len());
        for (index, tile, handle) in handles {
            let result = match handle.join().await {
                Ok(result) => result,
                Err(pool_err) => Err(EngineError::Pool(pool_err)),
            };
            if let Err(err) = &result {
                warn!(index, url = %tile.url, error = %err, "tile task failed");
            }
            runs.push(TileRun {
                index,
                tile,
                result,
            });
        }

        pool.shutdown().await;
        Ok(runs)
    }

    /// Execute a plan. `replan` is invoked with `use_xlink_href = true`
    /// exactly once when every tile of the first pass came back as an XML
    /// body (the service wanted its own advertised endpoint).
    pub async fn execute<F>(
        &self,
        plan: Vec<TileRequest>,
        replan: F,
    ) -> Result<EngineOutput, EngineError>
    where
        F: Fn(bool) -> Result<Vec<TileRequest>, PlanError>,
    {
        if plan.is_empty() {
            return Err(EngineError::Plan(PlanError::EmptyPlan));
        }

        let mut plan = plan;
        let mut runs = self.run_batch(&plan).await?;

        if download::should_replan_with_xlink(&runs) {
            info!("every tile returned XML; replanning against the capability endpoint");
            plan = replan(true)?;
            if plan.is_empty() {
                return Err(EngineError::Plan(PlanError::EmptyPlan));
            }
            runs = self.run_batch(&plan).await?;
        }

        if !runs.iter().any(TileRun::succeeded) {
            return Err(EngineError::NoTilesDownloaded);
        }

        let failures: Vec<(usize, String)> = runs
            .iter()
            .filter_map(|run| {
                run.result
                    .as_ref()
                    .err()
                    .map(|e| (run.index, e.to_string()))
            })
            .collect();

        // Mosaic over the full plan; unreadable (failed) tiles stay
        // transparent.
        let tile_crs = self.registry.resolve(&plan[0].bbox.crs_id)?;
        let mosaic_path = mosaic::splice(self.backend.as_ref(), &plan, tile_crs.wkt())?;

        // Final reprojection of the mosaic into the target CRS.
        let target = self.registry.resolve(&self.config.target_crs)?;
        let geo_transform = self.backend.geo_transform(&mosaic_path)?;
        let reprojected_path = download::reprojected_path(&mosaic_path);
        self.backend.warp(
            &mosaic_path,
            &reprojected_path,
            tile_crs.wkt(),
            target.wkt(),
            geo_transform,
        )?;

        info!(
            mosaic = %mosaic_path,
            reprojected = %reprojected_path,
            failed_tiles = failures.len(),
            "plan executed"
        );
        Ok(EngineOutput {
            mosaic_path,
            reprojected_path,
            tile_crs_id: tile_crs.uid().to_string(),
            level: plan[0].level,
            failures,
        })
    }

    /// Reproject the mosaic to EPSG:3857 and ingest it into a GeoPackage
    /// raster pyramid table for the plan's zoom level.
    pub fn write_geopackage(&self, output: &EngineOutput, gpkg_path: &str) -> Result<(), EngineError> {
        let source_gt = self.backend.geo_transform(&output.mosaic_path)?;
        let tile_crs = self.registry.resolve(&output.tile_crs_id)?;
        let mercator = self.registry.resolve("EPSG:3857")?;

        let web_path = format!("{}.3857.tiff", output.mosaic_path);
        self.backend.warp(
            &output.mosaic_path,
            &web_path,
            tile_crs.wkt(),
            mercator.wkt(),
            source_gt,
        )?;
        self.backend
            .ingest_geopackage(&web_path, gpkg_path, output.level)?;
        Ok(())
    }
}
