use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ndarray::Array2;

use rusty_cube::config::Config;
use rusty_cube::data::model::SceneSummary;
use rusty_cube::data::registry::scan_scene_folders;
use rusty_cube::data::spectrum_file::read_vector;
use rusty_cube::resample::{arange, resample_scene};
use rusty_cube::spectral::{blackbody_spectrum, scale_to_peak, SUN_TEMPERATURE_K};
use rusty_cube::worker::spawn_scene_load;
use rusty_cube::{container, preview, stats, synth};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "rusty-cube",
    version,
    about = "Load, synthesize, resample and summarize hyperspectral scenes"
)]
struct Cli {
    /// Configuration file (default: config/scene.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory holding one folder per dataset (overrides the configuration)
    #[arg(long, global = true)]
    scenes_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered datasets and whether their folder is present
    List,

    /// Load a registered dataset in the background and report on it
    Load {
        name: String,
        /// Save the canonical scene as an .npz container
        #[arg(long)]
        save: Option<PathBuf>,
        /// Write per-class statistics (.json or .csv)
        #[arg(long)]
        stats: Option<PathBuf>,
        /// Write an RGB preview PNG from the dataset's preview bands
        #[arg(long)]
        preview: Option<PathBuf>,
        /// Write the label map as a PNG in palette colours
        #[arg(long)]
        labels_png: Option<PathBuf>,
    },

    /// Print the shape and wavelength range of a scene container
    Info { container: PathBuf },

    /// Per-class statistics of a scene container
    Stats {
        container: PathBuf,
        /// Take class names and ignored labels from this registered dataset
        #[arg(long)]
        dataset: Option<String>,
        /// Labels to leave out (ignored when --dataset is given)
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<u32>,
        /// Output file (.json or .csv); JSON to stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resample a scene container onto a new wavelength grid
    Resample {
        input: PathBuf,
        output: PathBuf,
        /// First wavelength of the new grid (nm)
        #[arg(long, requires_all = ["stop", "step"], conflicts_with = "wavelengths")]
        start: Option<f64>,
        /// End of the new grid, excluded (nm)
        #[arg(long)]
        stop: Option<f64>,
        /// Grid step (nm)
        #[arg(long)]
        step: Option<f64>,
        /// Target wavelengths from a 1-D .npy or CSV file
        #[arg(long)]
        wavelengths: Option<PathBuf>,
    },

    /// Build a scene from a mask: blackbody background, measured spectrum
    /// where the mask is set
    Synthesize {
        /// Mask image; black pixels are background
        #[arg(long)]
        mask: PathBuf,
        /// Wavelength axis (nm) as 1-D .npy or CSV
        #[arg(long)]
        wavelengths: PathBuf,
        /// Foreground spectrum sampled on the same axis (.npy or CSV)
        #[arg(long)]
        spectrum: PathBuf,
        /// CSV column holding the spectrum values
        #[arg(long)]
        column: Option<String>,
        /// Blackbody temperature of the background (K)
        #[arg(long, default_value_t = SUN_TEMPERATURE_K)]
        temperature: f64,
        /// Peak value the background spectrum is scaled to
        #[arg(long, default_value_t = 0.1)]
        peak: f64,
        #[arg(short, long)]
        output: PathBuf,
    },
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::discover(cli.config.as_deref()).context("reading configuration")?;
    let scenes_dir = cli
        .scenes_dir
        .clone()
        .unwrap_or_else(|| config.scenes_directory.clone());

    match cli.command {
        Command::List => list(&config, &scenes_dir),
        Command::Load {
            name,
            save,
            stats,
            preview,
            labels_png,
        } => load(&config, &scenes_dir, &name, save, stats, preview, labels_png),
        Command::Info { container } => info(&container),
        Command::Stats {
            container,
            dataset,
            ignore,
            output,
        } => container_stats(&config, &container, dataset.as_deref(), ignore, output),
        Command::Resample {
            input,
            output,
            start,
            stop,
            step,
            wavelengths,
        } => {
            let grid = match (start, stop, step, wavelengths) {
                (_, _, _, Some(path)) => read_vector(&path, None)
                    .with_context(|| format!("reading wavelengths from {}", path.display()))?,
                (Some(start), Some(stop), Some(step), None) => arange(start, stop, step)?,
                _ => bail!("give either --start/--stop/--step or --wavelengths"),
            };
            let scene = container::load(&input)
                .with_context(|| format!("loading {}", input.display()))?;
            let resampled = resample_scene(&scene, &grid).context("resampling")?;
            container::save(&resampled, &output)
                .with_context(|| format!("saving {}", output.display()))
        }
        Command::Synthesize {
            mask,
            wavelengths,
            spectrum,
            column,
            temperature,
            peak,
            output,
        } => synthesize(
            &mask,
            &wavelengths,
            &spectrum,
            column.as_deref(),
            temperature,
            peak,
            &output,
        ),
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

fn list(config: &Config, scenes_dir: &Path) -> Result<()> {
    let registry = config.registry();
    let available = registry.available(scenes_dir);
    for d in registry.descriptors() {
        let mark = if available.contains(&d.name.as_str()) { "*" } else { " " };
        println!(
            "{mark} {:<14} {:>3} classes  {}",
            d.name,
            d.label_values.len(),
            d.folder_in(scenes_dir).display()
        );
    }
    if scenes_dir.is_dir() {
        let registered = |folder: &str| {
            registry
                .descriptors()
                .any(|d| d.folder.as_deref().unwrap_or(&d.name) == folder)
        };
        let unregistered: Vec<String> = scan_scene_folders(scenes_dir)?
            .into_iter()
            .filter(|f| !registered(f))
            .collect();
        if !unregistered.is_empty() {
            println!("Unregistered folders: {}", unregistered.join(", "));
        }
    }
    Ok(())
}

fn load(
    config: &Config,
    scenes_dir: &Path,
    name: &str,
    save: Option<PathBuf>,
    stats_out: Option<PathBuf>,
    preview_out: Option<PathBuf>,
    labels_png: Option<PathBuf>,
) -> Result<()> {
    let handle = spawn_scene_load(config.loader(), name, scenes_dir.to_path_buf())?;
    let ready = handle.wait().with_context(|| format!("loading dataset {name}"))?;
    let loaded = &ready.loaded;

    let summary = SceneSummary::from(&loaded.scene);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    for (class, s) in &ready.statistics {
        println!("{:>3} {:<30} {:>8} px", s.label, class, s.pixels);
    }

    if let Some(path) = save {
        container::save(&loaded.scene, &path)?;
    }
    if let Some(path) = stats_out {
        stats::save(&ready.statistics, loaded.scene.wavelengths(), &path)?;
    }
    if let Some(path) = preview_out {
        let img = preview::rgb_preview(loaded.scene.cube(), loaded.rgb_bands)?;
        preview::save_png(&img, &path)?;
    }
    if let Some(path) = labels_png {
        let img = preview::label_image(loaded.scene.labels(), &loaded.palette);
        preview::save_png(&img, &path)?;
    }
    Ok(())
}

fn info(path: &Path) -> Result<()> {
    let scene = container::load(path).with_context(|| format!("loading {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&SceneSummary::from(&scene))?);
    let hist = stats::label_histogram(scene.labels(), &[]);
    for (label, count) in hist {
        println!("label {label:>3}: {count} px");
    }
    Ok(())
}

fn container_stats(
    config: &Config,
    path: &Path,
    dataset: Option<&str>,
    ignore: Vec<u32>,
    output: Option<PathBuf>,
) -> Result<()> {
    let scene = container::load(path).with_context(|| format!("loading {}", path.display()))?;
    let (names, ignored) = match dataset {
        Some(name) => {
            let registry = config.registry();
            let d = registry.get(name)?;
            (d.label_values.clone(), d.ignored_labels.clone())
        }
        None => {
            let max = scene.labels().iter().copied().max().unwrap_or(0);
            ((0..=max).map(|l| format!("label {l}")).collect(), ignore)
        }
    };
    let result = stats::compute(scene.cube(), scene.labels(), &names, &ignored)?;
    match output {
        Some(out) => stats::save(&result, scene.wavelengths(), &out)?,
        None => println!("{}", serde_json::to_string_pretty(&result)?),
    }
    Ok(())
}

fn synthesize(
    mask_path: &Path,
    wavelengths_path: &Path,
    spectrum_path: &Path,
    column: Option<&str>,
    temperature: f64,
    peak: f64,
    output: &Path,
) -> Result<()> {
    let mask = image::open(mask_path)
        .with_context(|| format!("opening mask {}", mask_path.display()))?
        .to_luma8();
    let (w, h) = mask.dimensions();
    let mask = Array2::from_shape_vec((h as usize, w as usize), mask.into_raw())?;

    let wavelengths = read_vector(wavelengths_path, None)
        .with_context(|| format!("reading {}", wavelengths_path.display()))?;
    let foreground = read_vector(spectrum_path, column)
        .with_context(|| format!("reading {}", spectrum_path.display()))?;
    let background = scale_to_peak(&blackbody_spectrum(&wavelengths, temperature)?, peak)?;

    let scene = synth::compose_scene(&mask, &wavelengths, &background, &foreground)?;
    container::save(&scene, output)?;
    Ok(())
}
