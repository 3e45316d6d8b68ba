//! Interactive map weaver CLI.
//!
//! Reads service URLs from stdin in a loop; for each one, fetches and parses
//! the capabilities, prompts for layer / tile matrix set / format / style,
//! plans the configured viewport, downloads and mosaics the tiles, and
//! reprojects the result. Optionally ingests the mosaic into a GeoPackage.

mod prompt;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use weave_client::{ClientConfig, MapClient, PlanInputs};
use weave_common::{ProxyConfig, Rect};

#[derive(Parser, Debug)]
#[command(name = "weaver")]
#[command(about = "Fetch WMS/WMTS layers into a georeferenced mosaic")]
struct Args {
    /// Service capabilities URL; prompts interactively when omitted
    url: Option<String>,

    /// Scratch directory for tiles and mosaics
    #[arg(long, default_value = "temp")]
    temp_dir: PathBuf,

    /// PROJ data directory (proj.db); exported as PROJ_LIB when set
    #[arg(long)]
    proj_dir: Option<PathBuf>,

    /// Viewport in EPSG:4326 as "minLon,minLat,maxLon,maxLat"
    #[arg(long, default_value = "-180,-90,180,90")]
    viewport: String,

    /// Target CRS of the delivered mosaic
    #[arg(long, default_value = "EPSG:4326")]
    target_crs: String,

    /// Download worker count
    #[arg(long, default_value = "6")]
    concurrency: usize,

    /// HTTP proxy used as fallback on network failures
    #[arg(long, env = "WEAVER_PROXY")]
    proxy_url: Option<String>,

    /// Proxy basic-auth user
    #[arg(long, env = "WEAVER_PROXY_USER")]
    proxy_user: Option<String>,

    /// Proxy basic-auth password
    #[arg(long, env = "WEAVER_PROXY_PASSWORD")]
    proxy_password: Option<String>,

    /// Write the mosaic into this GeoPackage as a raster pyramid level
    #[arg(long)]
    gpkg: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(proj_dir) = &args.proj_dir {
        // The CRS substrate reads PROJ_LIB at first use.
        std::env::set_var("PROJ_LIB", proj_dir);
        info!(dir = %proj_dir.display(), "PROJ data directory set");
    }

    std::fs::create_dir_all(&args.temp_dir)
        .with_context(|| format!("creating temp dir {}", args.temp_dir.display()))?;

    let viewport = Rect::from_wms_string(&args.viewport)
        .context("viewport must be \"minLon,minLat,maxLon,maxLat\"")?;

    let proxy = args.proxy_url.as_ref().map(|url| {
        let mut cfg = ProxyConfig::new(url.clone());
        if let (Some(user), Some(password)) = (&args.proxy_user, &args.proxy_password) {
            cfg = cfg.with_basic_auth(user.clone(), password.clone());
        }
        cfg
    });

    let config = ClientConfig {
        temp_dir: args.temp_dir.clone(),
        concurrency: args.concurrency,
        target_crs: args.target_crs.clone(),
        proxy,
    };

    if let Some(url) = &args.url {
        let mut client = MapClient::new(config)?;
        run_once(&mut client, url, viewport, args.gpkg.as_deref()).await?;
        return Ok(());
    }

    // Interactive loop: one URL per round, until stdin closes.
    loop {
        let Some(url) = prompt::read_line("Capabilities URL (empty to quit):")? else {
            break;
        };
        if url.is_empty() {
            break;
        }
        if !url.contains("http") {
            println!("That does not look like a URL.");
            continue;
        }

        let mut client = MapClient::new(config.clone())?;
        if let Err(err) = run_once(&mut client, &url, viewport, args.gpkg.as_deref()).await {
            println!("Failed: {err:#}");
        }
    }
    Ok(())
}

async fn run_once(
    client: &mut MapClient,
    url: &str,
    viewport: Rect,
    gpkg: Option<&std::path::Path>,
) -> Result<()> {
    let started = Instant::now();
    let xml = client.fetch(url).await.context("downloading capabilities")?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "capabilities downloaded");

    let started = Instant::now();
    client.parse(&xml).context("parsing capabilities")?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "capabilities parsed");

    let Some(choice) = prompt::choose_map(client)? else {
        println!("No layers available.");
        return Ok(());
    };

    let clipped = client
        .clip_viewport_4326(&choice.layer_title, &choice.tile_matrix_set, &viewport)
        .context("clipping viewport against layer and target CRS bounds")?;

    let inputs = PlanInputs {
        layer_title: choice.layer_title,
        tile_matrix_set: choice.tile_matrix_set,
        format: choice.format,
        style: choice.style,
        viewport: clipped,
        service_url: url.to_string(),
    };

    let plan = client.plan(&inputs, false).context("planning tiles")?;
    println!("Planned {} tile(s) at level {}.", plan.len(), plan[0].level);

    let started = Instant::now();
    let output = client.execute(plan, &inputs).await.context("executing plan")?;
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        failures = output.failures.len(),
        "download and mosaic finished"
    );

    println!("Mosaic:      {}", output.mosaic_path);
    println!("Reprojected: {}", output.reprojected_path);
    for (index, error) in &output.failures {
        println!("  tile {index} failed: {error}");
    }

    if let Some(gpkg_path) = gpkg {
        client
            .write_geopackage(&output, &gpkg_path.to_string_lossy())
            .context("writing GeoPackage")?;
        println!("GeoPackage:  {}", gpkg_path.display());
    }
    Ok(())
}
