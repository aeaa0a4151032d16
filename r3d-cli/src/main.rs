use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use r3d_core::{
    align, crop, io, lines, rename, score_log::ScoreLog, sdf, stats, AlignOptions, R3dError,
    SdfComparison, SdfMode, ToolConfig,
};
use r3d_cli::{Layer, PreviewApp, CANDIDATE_COLOR, GROUND_TRUTH_COLOR};

/// Mesh alignment, SDF scoring and dataset maintenance tools.
#[derive(Debug, Parser)]
#[command(author, version, about = "Mesh and dataset tooling for manipulation datasets")]
struct Args {
    /// Optional path to a JSON ToolConfig. Defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Align a candidate mesh to a reference using the handle heuristic
    Align {
        reference: PathBuf,
        candidate: PathBuf,
        /// `.obj` path, or a stem that gets `Rotated.obj` appended
        output: PathBuf,
        /// Skip scaling, reorientation and the handle shift
        #[arg(long)]
        rotate_only: bool,
    },
    /// Align every `.obj` in a folder against one reference
    AlignAll {
        reference: PathBuf,
        input_dir: PathBuf,
        output_dir: PathBuf,
        #[arg(long)]
        rotate_only: bool,
    },
    /// SDF error of a candidate mesh against a ground-truth mesh
    Sdf {
        candidate: PathBuf,
        ground_truth: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        #[arg(long)]
        samples: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Show both meshes in the terminal afterwards
        #[arg(long)]
        preview: bool,
    },
    /// Score every `.obj` in a folder, appending to a score log
    SdfAll {
        ground_truth: PathBuf,
        dir: PathBuf,
        #[arg(long, default_value = "baseline_sdfs.txt")]
        log: PathBuf,
        /// Write a `<stem>_comparison.txt` preview next to each newly scored mesh
        #[arg(long)]
        comparisons: bool,
    },
    /// Per-category statistics of a score file
    Stats { file: PathBuf },
    /// Sort the lines of a text file
    Sort {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long)]
        reverse: bool,
        #[arg(short, long)]
        ignore_case: bool,
    },
    /// Prefix every file in a folder
    Prefix { dir: PathBuf, prefix: String },
    /// Crop detected parts out of an image
    Crop {
        image: PathBuf,
        /// JSON detections for the image
        detections: PathBuf,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Make face winding consistent and outward
    FixNormals { input: PathBuf, output: PathBuf },
    /// View meshes in the terminal
    Preview {
        candidate: PathBuf,
        ground_truth: Option<PathBuf>,
        /// Print a single frame instead of starting the viewer
        #[arg(long)]
        once: bool,
    },
    /// List the demonstrations in an HDF5 archive
    #[cfg(feature = "hdf5")]
    H5List { file: PathBuf },
    /// Delete `data/<key>` from an HDF5 archive
    #[cfg(feature = "hdf5")]
    H5Delete { file: PathBuf, key: String },
    /// Copy one object of an HDF5 archive into a new file
    #[cfg(feature = "hdf5")]
    H5Extract {
        input: PathBuf,
        output: PathBuf,
        key: String,
        /// Destination path in the new file, `key` when omitted
        #[arg(long)]
        dest: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Symmetric,
    OneSided,
}

impl From<ModeArg> for SdfMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Symmetric => SdfMode::Symmetric,
            ModeArg::OneSided => SdfMode::OneSided,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ToolConfig> {
    match path {
        Some(path) => ToolConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ToolConfig::default()),
    }
}

fn align_options(config: &ToolConfig, rotate_only: bool) -> AlignOptions {
    if rotate_only {
        AlignOptions {
            handle: config.align.handle,
            ..AlignOptions::rotate_only()
        }
    } else {
        config.align
    }
}

fn stats_report(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let scores = stats::parse_scores(&text)?;
    Ok(stats::analyze(&scores)?.to_string())
}

fn preview(layers: Vec<Layer>, caption: String, once: bool) -> Result<()> {
    let mut app = PreviewApp::new(layers, caption, 80, 30)?;
    if once {
        print!("{}", app.snapshot());
    } else {
        app.run().context("terminal preview failed")?;
    }
    Ok(())
}

/// Overlay of a scored candidate and the ground truth, saved as
/// `<stem>_comparison.txt` beside the candidate
fn save_comparison(candidate: &Path, cmp: &SdfComparison) -> r3d_core::Result<PathBuf> {
    let layers = vec![
        Layer::new(cmp.candidate.clone(), CANDIDATE_COLOR),
        Layer::new(cmp.ground_truth.clone(), GROUND_TRUTH_COLOR),
    ];
    let caption = format!("SDF Error: {:.4}", cmp.normalized_error);
    let mut app = PreviewApp::new(layers, caption, 80, 40)?;

    let stem = candidate.file_stem().unwrap_or_default().to_string_lossy();
    let path = candidate.with_file_name(format!("{stem}_comparison.txt"));
    fs::write(&path, app.snapshot()).map_err(R3dError::at(&path))?;
    Ok(path)
}

fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    log::debug!("{config:?}");

    match args.command {
        Command::Align {
            reference,
            candidate,
            output,
            rotate_only,
        } => {
            let options = align_options(&config, rotate_only);
            let written = align::align_files(&reference, &candidate, &output, &options)
                .with_context(|| format!("failed to align {}", candidate.display()))?;
            println!("{}", written.display());
        }
        Command::AlignAll {
            reference,
            input_dir,
            output_dir,
            rotate_only,
        } => {
            let options = align_options(&config, rotate_only);
            let report = align::align_folder(&reference, &input_dir, &output_dir, &options)?;
            println!("aligned {} meshes, {} failed", report.aligned.len(), report.failed.len());
            for (path, reason) in &report.failed {
                println!("  {}: {reason}", path.display());
            }
        }
        Command::Sdf {
            candidate,
            ground_truth,
            mode,
            samples,
            seed,
            preview: show,
        } => {
            let mut options = config.sdf;
            if let Some(mode) = mode {
                options.mode = mode.into();
            }
            if let Some(samples) = samples {
                options.samples = samples;
            }
            if let Some(seed) = seed {
                options.seed = seed;
            }

            let candidate_mesh = io::load_mesh(&candidate)?;
            let gt_mesh = io::load_mesh(&ground_truth)?;
            let comparison = sdf::compare_meshes(&candidate_mesh, &gt_mesh, &options)?;
            println!("SDF error: {}", comparison.raw_error);
            println!("Normalized SDF error: {}", comparison.normalized_error);

            if show {
                let caption = format!("Normalized SDF error: {:.6}", comparison.normalized_error);
                let layers = vec![
                    Layer::new(comparison.candidate, CANDIDATE_COLOR),
                    Layer::new(comparison.ground_truth, GROUND_TRUTH_COLOR),
                ];
                preview(layers, caption, false)?;
            }
        }
        Command::SdfAll {
            ground_truth,
            dir,
            log,
            comparisons,
        } => {
            let mut scores = ScoreLog::open(&log)?;
            let report = sdf::score_folder(&ground_truth, &dir, &mut scores, &config.sdf, |path, cmp| {
                if comparisons {
                    let written = save_comparison(path, cmp)?;
                    log::info!("comparison saved to {}", written.display());
                }
                Ok(())
            })?;
            println!(
                "{} already scored, {} newly scored, {} failed",
                report.skipped.len(),
                report.scored.len(),
                report.failed.len()
            );
        }
        Command::Stats { file } => println!("{}", stats_report(&file)?),
        Command::Sort {
            input,
            output,
            reverse,
            ignore_case,
        } => {
            let options = lines::SortOptions { reverse, ignore_case };
            let count = lines::sort_file(&input, &output, options)?;
            println!("sorted {count} lines into {}", output.display());
        }
        Command::Prefix { dir, prefix } => {
            if prefix.is_empty() {
                bail!("prefix must not be empty");
            }
            let renamed = rename::add_prefix(&dir, &prefix)?;
            println!("renamed {} files", renamed.len());
        }
        Command::Crop {
            image,
            detections,
            threshold,
        } => {
            let mut options = config.crop;
            if let Some(threshold) = threshold {
                options.score_threshold = threshold;
            }
            for path in crop::crop_image_file(&image, &detections, &options)? {
                println!("{}", path.display());
            }
        }
        Command::FixNormals { input, output } => {
            let mut mesh = io::load_mesh(&input)?;
            let flipped = mesh.fix_normals();
            io::save_mesh(&mesh, &output)?;
            println!("flipped {flipped} faces");
        }
        Command::Preview {
            candidate,
            ground_truth,
            once,
        } => {
            let mut layers = vec![Layer::new(io::load_mesh(&candidate)?, CANDIDATE_COLOR)];
            let mut caption = candidate.display().to_string();
            if let Some(gt) = ground_truth {
                layers.push(Layer::new(io::load_mesh(&gt)?, GROUND_TRUTH_COLOR));
                caption = format!("{caption} vs {}", gt.display());
            }
            preview(layers, caption, once)?;
        }
        #[cfg(feature = "hdf5")]
        Command::H5List { file } => {
            for name in r3d_core::archive::list_demos(&file)? {
                println!("{name}");
            }
        }
        #[cfg(feature = "hdf5")]
        Command::H5Delete { file, key } => {
            if !r3d_core::archive::delete_demo(&file, &key)? {
                bail!("{key} does not exist in {}", file.display());
            }
        }
        #[cfg(feature = "hdf5")]
        Command::H5Extract {
            input,
            output,
            key,
            dest,
        } => {
            let dest = dest.unwrap_or_else(|| key.clone());
            r3d_core::archive::extract_key(&input, &output, &key, &dest)?;
        }
    }
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    run(args)
}
