/// GeoTIFF import tool: decodes single-band Float32/Float64/u8/u16 TIFFs and
/// writes them into a workspace directory as raster JSON, mapping the nodata
/// sentinel to missing cells. The raster name defaults to the file stem, so
/// depth/velocity survey rasters keep the naming schema the pairing stage
/// relies on (`RasterNameText_UNIQUEID` or `UNIQUEID_RasterNameText`).
use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tiff::decoder::{Decoder, DecodingResult};

use hsi_core::raster::Raster;
use hsi_core::store::{DirStore, RasterStore};

#[derive(Parser, Debug)]
#[command(
    name = "import-tiff",
    about = "Import single-band GeoTIFF rasters into an HSI workspace"
)]
struct Args {
    /// TIFF files to import
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Workspace directory to write raster JSON into (created if absent)
    #[arg(short, long)]
    output: PathBuf,

    /// Nodata sentinel mapped to missing cells
    #[arg(long, default_value = "-9999")]
    nodata: f32,

    /// Cell width in map units
    #[arg(long, default_value = "1.0")]
    cell_width: f64,

    /// Cell height in map units
    #[arg(long, default_value = "1.0")]
    cell_height: f64,

    /// X coordinate of the grid's south-west corner
    #[arg(long, default_value = "0.0")]
    origin_x: f64,

    /// Y coordinate of the grid's south-west corner
    #[arg(long, default_value = "0.0")]
    origin_y: f64,
}

/// Decode one TIFF into row-major f32 cells, nodata mapped to NaN.
/// TIFF rows run north to south; workspace rasters store row 0 at the south
/// edge, so rows are reversed here.
fn decode_tiff(path: &PathBuf, nodata: f32) -> Result<(Vec<f32>, usize, usize)> {
    let file = fs::File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut decoder = Decoder::new(io::BufReader::new(file))
        .with_context(|| format!("{} is not a valid TIFF", path.display()))?;
    let (width, height) = decoder
        .dimensions()
        .with_context(|| format!("reading dimensions of {}", path.display()))?;
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        bail!("{} has a zero-sized image", path.display());
    }

    let img = decoder
        .read_image()
        .with_context(|| format!("decoding {}", path.display()))?;
    let cells: Vec<f32> = match img {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        _ => bail!(
            "{}: unsupported pixel type (expected F32/F64/U8/U16 single band)",
            path.display()
        ),
    };
    if cells.len() != width * height {
        bail!(
            "{}: expected {} single-band samples, found {} (multi-band TIFFs are not supported)",
            path.display(),
            width * height,
            cells.len()
        );
    }

    let mut data = Vec::with_capacity(cells.len());
    for row in (0..height).rev() {
        for &v in &cells[row * width..(row + 1) * width] {
            data.push(if v == nodata { f32::NAN } else { v });
        }
    }
    Ok((data, width, height))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut store = DirStore::open(&args.output)
        .with_context(|| format!("opening workspace {}", args.output.display()))?;

    for path in &args.files {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("{} has no usable file stem", path.display()))?
            .to_string();
        let (data, width, height) = decode_tiff(path, args.nodata)?;
        let valid = data.iter().filter(|v| !v.is_nan()).count();

        let raster = Raster {
            data,
            width,
            height,
            min_x: args.origin_x,
            min_y: args.origin_y,
            cell_width: args.cell_width,
            cell_height: args.cell_height,
        };
        store.save(&name, &raster)?;
        eprintln!(
            "{} -> {} ({}x{}, {:.1}% valid)",
            path.display(),
            name,
            width,
            height,
            100.0 * valid as f64 / (width * height) as f64
        );
    }
    eprintln!("Done. {} rasters imported into {}.", args.files.len(), args.output.display());
    Ok(())
}
