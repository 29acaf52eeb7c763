use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use morphometry::{
    BatchSummary, CaptureDate, DetectStrategy, FixedCaptureDate, MorphometryConfig, NoCaptureDate,
    camera_batch, normalize_batch, scanner_batch,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "morphometry")]
#[command(about = "Measure length, area and shading of organisms in camera and scanner images")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Brightness-normalize raw camera images into the gray directory.
    #[command(name = "normalize")]
    Normalize(NormalizeArgs),
    /// Measure one object per normalized camera image.
    #[command(name = "camera")]
    Camera(CameraArgs),
    /// Measure every object on scanned pages.
    #[command(name = "scanner")]
    Scanner(ScannerArgs),
    /// Print or write the effective configuration.
    #[command(name = "config")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// JSON configuration; missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    input: Option<PathBuf>,
    #[arg(long, global = true)]
    gray: Option<PathBuf>,
    #[arg(long, global = true)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct NormalizeArgs {
    /// Background level to normalize to.
    #[arg(long)]
    target: Option<u8>,
    /// Capture date stamped into every output name, e.g. "2023:05:09".
    #[arg(long)]
    date: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct CameraArgs {
    /// Pixels per millimetre.
    #[arg(long)]
    scale: Option<f64>,
    /// Half side of the square ROI around the detected object.
    #[arg(long)]
    roi: Option<usize>,
}

#[derive(Args, Debug, Clone)]
struct ScannerArgs {
    /// Pixels per millimetre.
    #[arg(long)]
    scale: Option<f64>,
}

#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Print the configuration as pretty JSON.
    #[arg(long)]
    dump: bool,
    /// Write the configuration to this file.
    #[arg(long)]
    write: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = load_config(&cli.common)?;
    tracing::debug!(?cfg.paths, "configuration loaded");

    match cli.cmd {
        Command::Normalize(args) => run_normalize(&mut cfg, args),
        Command::Camera(args) => run_camera(&mut cfg, args),
        Command::Scanner(args) => run_scanner(&mut cfg, args),
        Command::Config(args) => run_config(&cfg, args),
    }
}

fn load_config(common: &CommonArgs) -> Result<MorphometryConfig> {
    let mut cfg = match &common.config {
        Some(path) => {
            ensure_file_exists(path, "config")?;
            MorphometryConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?
        }
        None => MorphometryConfig::default(),
    };

    if let Some(p) = &common.input {
        cfg.paths.input_dir = p.clone();
    }
    if let Some(p) = &common.gray {
        cfg.paths.gray_dir = p.clone();
    }
    if let Some(p) = &common.out {
        cfg.paths.out_dir = p.clone();
    }
    Ok(cfg)
}

fn run_normalize(cfg: &mut MorphometryConfig, args: NormalizeArgs) -> Result<()> {
    if let Some(target) = args.target {
        cfg.normalize.target = target;
    }
    cfg.validate().context("validating configuration")?;
    ensure_dir_exists(&cfg.paths.input_dir, "input")?;

    let dates: Box<dyn CaptureDate> = match args.date {
        Some(d) => Box::new(FixedCaptureDate(d)),
        None => Box::new(NoCaptureDate),
    };
    let summary = normalize_batch(&cfg.paths, &cfg.normalize, dates.as_ref())
        .with_context(|| format!("normalizing {}", cfg.paths.input_dir.display()))?;
    report("normalize", &summary);
    Ok(())
}

fn run_camera(cfg: &mut MorphometryConfig, args: CameraArgs) -> Result<()> {
    if let Some(scale) = args.scale {
        cfg.camera.measure.scale = scale;
    }
    if let Some(half) = args.roi {
        match &mut cfg.camera.detector.strategy {
            DetectStrategy::Adaptive(env) => env.roi_half_extent = half,
            DetectStrategy::Global(_) => bail!("--roi needs the adaptive camera detector"),
        }
    }
    cfg.validate().context("validating configuration")?;
    ensure_dir_exists(&cfg.paths.gray_dir, "gray")?;

    let summary = camera_batch(&cfg.paths, &cfg.camera)
        .with_context(|| format!("camera batch on {}", cfg.paths.gray_dir.display()))?;
    report("camera", &summary);
    Ok(())
}

fn run_scanner(cfg: &mut MorphometryConfig, args: ScannerArgs) -> Result<()> {
    if let Some(scale) = args.scale {
        cfg.scanner.measure.scale = scale;
    }
    cfg.validate().context("validating configuration")?;
    ensure_dir_exists(&cfg.paths.input_dir, "input")?;

    let summary = scanner_batch(&cfg.paths, &cfg.scanner)
        .with_context(|| format!("scanner batch on {}", cfg.paths.input_dir.display()))?;
    report("scanner", &summary);
    Ok(())
}

fn run_config(cfg: &MorphometryConfig, args: ConfigArgs) -> Result<()> {
    cfg.validate().context("validating configuration")?;
    if let Some(path) = &args.write {
        write_json(path, cfg)?;
    }
    if args.dump || args.write.is_none() {
        let text = serde_json::to_string_pretty(cfg).context("serializing config")?;
        println!("{text}");
    }
    Ok(())
}

fn report(mode: &str, s: &BatchSummary) {
    println!(
        "{mode}: {} images, {} measured, {} without result, {} skipped, {} failed",
        s.images, s.measured, s.unmeasured, s.skipped, s.failed
    );
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serializing json")?;
    fs::write(path, bytes).with_context(|| format!("writing json {}", path.display()))
}

fn ensure_file_exists(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        bail!("{what} file does not exist: {}", path.display());
    }
    Ok(())
}

fn ensure_dir_exists(path: &Path, what: &str) -> Result<()> {
    if !path.is_dir() {
        bail!("{what} directory does not exist: {}", path.display());
    }
    Ok(())
}
