//! Render a synthetic fluorophore volume through the confocal model
//!
//! Sizes a random point cloud so the output covers the requested bounds,
//! resolves it into an 8-bit image stack plus ground-truth labels and
//! writes one PNG per slice and channel, together with a JSON record of the
//! optics parameters used.
//!
//! Usage:
//! ```
//! RUST_LOG=info cargo run --release --bin confocal_render -- --slices 4 --width 128 --height 128
//! ```

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::info;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use confocal_sim::hardware::optics::models;
use confocal_sim::hardware::{expanded_dims, ConfocalMicroscope, OpticsConfig};
use confocal_sim::photometry::FluorophoreLibrary;
use confocal_sim::volume::{FluorVolume, LabelVolume};
use shared::image_proc::save_u8_image;

/// Command line arguments for the confocal renderer
#[derive(Parser, Debug)]
#[command(version, about = "Confocal fluorescence microscope renderer")]
struct Args {
    /// Optics configuration JSON (defaults to the built-in two-channel 40x unit)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fluorophore library JSON (defaults to the built-in dyes)
    #[arg(long)]
    spectra: Option<PathBuf>,

    /// Fluorophore names, one per fluorophore type in the volume
    #[arg(long, value_delimiter = ',', default_value = "Alexa488,ATTO565")]
    fluors: Vec<String>,

    /// Axial voxel size of the expanded volume in nm
    #[arg(long, default_value_t = 40.0)]
    voxel_z_nm: f64,

    /// Transverse voxel size of the expanded volume in nm
    #[arg(long, default_value_t = 40.0)]
    voxel_xy_nm: f64,

    /// Tissue expansion factor
    #[arg(long, default_value_t = 4.0)]
    expansion: f64,

    /// Number of output slices wanted
    #[arg(long, default_value_t = 4)]
    slices: usize,

    /// Output width in pixels
    #[arg(long, default_value_t = 128)]
    width: usize,

    /// Output height in pixels
    #[arg(long, default_value_t = 128)]
    height: usize,

    /// Labelled points per raw voxel
    #[arg(long, default_value_t = 0.01)]
    density: f64,

    /// Largest number of fluorophores of one type at a point
    #[arg(long, default_value_t = 3)]
    max_multiplicity: u32,

    /// Random seed for the volume and the renderer
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output directory
    #[arg(long, default_value = "test_output/confocal")]
    output: PathBuf,
}

/// Random labelled points in a raw volume, mapped onto the expanded grid
fn synthetic_volumes(
    raw_dims: [usize; 3],
    expansion: f64,
    density: f64,
    fluor_types: usize,
    max_multiplicity: u32,
    seed: u64,
) -> Result<(FluorVolume, LabelVolume)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let voxels = raw_dims.iter().product::<usize>() as f64;
    let n = (voxels * density).round() as usize;

    let expand = |c: usize| (c as f64 * expansion).floor() as usize;
    let mut coords = [Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n)];
    for _ in 0..n {
        for (axis, coord) in coords.iter_mut().enumerate() {
            coord.push(expand(rng.gen_range(0..raw_dims[axis].max(1))));
        }
    }
    let multiplicities =
        Array2::from_shape_simple_fn((fluor_types, n), || rng.gen_range(0..=max_multiplicity));
    let labels = (1..=n as u32).collect();

    let [z, x, y] = coords;
    let labels = LabelVolume::from_unsorted(z.clone(), x.clone(), y.clone(), labels)?;
    let fluors = FluorVolume::from_unsorted(z, x, y, multiplicities)?;
    Ok((fluors, labels))
}

fn main() -> Result<()> {
    // Initialize logging from environment variables
    env_logger::init();
    let args = Args::parse();

    ensure!(args.expansion > 0.0, "expansion factor must be positive");
    ensure!(
        args.voxel_z_nm > 0.0 && args.voxel_xy_nm > 0.0,
        "voxel sizes must be positive"
    );

    let config = match &args.config {
        Some(path) => OpticsConfig::load_from_file(path)
            .with_context(|| format!("loading optics config {}", path.display()))?,
        None => OpticsConfig::new(models::TWO_CHANNEL_40X.clone())?,
    };
    let spectra = match &args.spectra {
        Some(path) => FluorophoreLibrary::load_from_file(path)
            .with_context(|| format!("loading fluorophore library {}", path.display()))?,
        None => FluorophoreLibrary::standard(),
    };

    let microscope = ConfocalMicroscope::new(config, spectra).with_seed(args.seed);
    let voxel_dims = [args.voxel_z_nm, args.voxel_xy_nm, args.voxel_xy_nm];
    let geometry = microscope.geometry(voxel_dims);

    let (depth, width, height) = microscope.compute_parameters(
        voxel_dims,
        args.expansion,
        [args.slices, args.width, args.height],
    );
    let volume_dims = expanded_dims([depth, width, height], args.expansion);
    info!("Raw volume {depth}x{width}x{height}, expanded to {volume_dims:?}");

    let (fluors, labels) = synthetic_volumes(
        [depth, width, height],
        args.expansion,
        args.density,
        args.fluors.len(),
        args.max_multiplicity,
        args.seed,
    )?;
    info!("Generated {} labelled points", fluors.points().len());

    let stack = microscope.resolve_volume(&geometry, &fluors, volume_dims, &args.fluors)?;
    let truth = microscope.resolve_ground_truth(&geometry, &labels, volume_dims);
    println!("Rendered stack {:?}, ground truth {:?}", stack.dim(), truth.dim());

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    for (k, slice) in stack.axis_iter(Axis(0)).enumerate() {
        for (channel, image) in slice.axis_iter(Axis(2)).enumerate() {
            let path = args.output.join(format!("channel{channel}_z{k:03}.png"));
            save_u8_image(&image, &path)
                .with_context(|| format!("writing {}", path.display()))?;
        }
    }
    for (k, slice) in truth.axis_iter(Axis(0)).enumerate() {
        let mask = slice.mapv(|label| if label > 0 { 255u8 } else { 0 });
        let path = args.output.join(format!("truth_z{k:03}.png"));
        save_u8_image(&mask, &path).with_context(|| format!("writing {}", path.display()))?;
    }

    let params_path = args.output.join("parameters.json");
    let json = serde_json::to_string_pretty(&microscope.parameters())?;
    std::fs::write(&params_path, json)
        .with_context(|| format!("writing {}", params_path.display()))?;

    println!("Output written to {}", args.output.display());
    Ok(())
}
