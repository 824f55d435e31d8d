/// Mussel HSI pipeline runner: pairs depth/velocity rasters from an input
/// workspace, classifies morphological units, scores them per species,
/// combines the suitability layers, and writes zonal statistics with
/// weighted usable area into an output workspace.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use hsi_core::pipeline::{resume_zonal, run, RunParams};
use hsi_core::species::SpeciesSelection;
use hsi_core::store::DirStore;

#[derive(Parser, Debug)]
#[command(
    name = "hsi",
    about = "Habitat Suitability Index calculator for freshwater mussels"
)]
struct Args {
    /// Input workspace: directory of survey raster JSON files
    #[arg(long)]
    input: PathBuf,

    /// Output workspace: directory receiving every produced artifact
    #[arg(long)]
    output: PathBuf,

    /// Coefficient of variation of the hydrograph
    #[arg(long)]
    cv: String,

    /// Name of the fish cover HSI raster in the input workspace
    #[arg(long, default_value = "FishCoverHSI")]
    fish_cover: String,

    /// Name of the substrate HSI raster in the input workspace
    #[arg(long, default_value = "SubstrateHSI")]
    substrate: String,

    /// Name of the percent silt HSI raster in the input workspace
    #[arg(long, default_value = "PercentSiltHSI")]
    percent_silt: String,

    /// Produce Western Pearlshell HSI rasters
    #[arg(long)]
    western_pearlshell: bool,

    /// Produce California Floater HSI rasters
    #[arg(long)]
    california_floater: bool,

    /// Name of an integer-coded zone raster in the input workspace
    #[arg(long)]
    zones_grid: Option<String>,

    /// Path to a polygon zone shapefile
    #[arg(long)]
    zones_shp: Option<PathBuf>,

    /// Attribute field holding the zone identifier
    #[arg(long, default_value = "Zone")]
    zone_field: String,

    /// Name of the seasonal high-flow velocity raster in the input workspace
    #[arg(long, default_value = "SeasHighFlowVel")]
    seasonal_velocity: String,

    /// Skip the raster stages and rerun zone aggregation over final HSI
    /// rasters already present in the output workspace
    #[arg(long)]
    resume_zonal: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("installing tracing subscriber")?;

    let params = RunParams {
        coefficient_of_variation: args.cv,
        fish_cover_hsi: args.fish_cover,
        substrate_hsi: args.substrate,
        percent_silt_hsi: args.percent_silt,
        species: SpeciesSelection::new(args.western_pearlshell, args.california_floater),
        zone_grid: args.zones_grid,
        zone_shapefile: args.zones_shp,
        zone_field: args.zone_field,
        seasonal_high_flow_velocity: args.seasonal_velocity,
    };

    let input = DirStore::open(&args.input)
        .with_context(|| format!("opening input workspace {}", args.input.display()))?;
    let mut output = DirStore::open(&args.output)
        .with_context(|| format!("opening output workspace {}", args.output.display()))?;

    let summary = if args.resume_zonal {
        resume_zonal(&input, &mut output, &params)?
    } else {
        run(&input, &mut output, &params)?
    };

    eprintln!(
        "Done. {} survey units, {} rasters, {} stats tables written to {}.",
        summary.unique_ids.len(),
        summary.rasters_written.len(),
        summary.tables_written.len(),
        args.output.display()
    );
    Ok(())
}
