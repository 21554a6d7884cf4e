use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use skel2vec::svg::{to_svg_document, SvgStyle};
use skel2vec::{BinaryImage, ThresholdMethod, VectorizeConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skel2vec", about = "Thinned skeleton bitmap to line and arc vector paths")]
struct Cli {
    /// Input skeleton image (PNG, JPEG, BMP), already thinned to 1px strokes
    #[arg(short, long)]
    input: PathBuf,

    /// Output SVG path
    #[arg(short, long)]
    output: PathBuf,

    /// Also write the segments as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Also write a side-by-side comparison PNG
    #[arg(long)]
    compare: Option<PathBuf>,

    /// Panel pixels per image pixel in the comparison PNG
    #[arg(long, default_value = "4")]
    scale: u32,

    /// Fixed brightness threshold (0-255). Overrides Otsu auto-detection.
    #[arg(long)]
    threshold: Option<u8>,

    /// Treat light strokes on a dark background as foreground
    #[arg(long)]
    invert: bool,

    /// JSON preset overriding the default tolerances
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep breakpoints at junction pixels fixed
    #[arg(long)]
    pin_junctions: bool,

    /// Process edges on one thread
    #[arg(long)]
    serial: bool,
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let t_start = Instant::now();

    let mut config = match &cli.config {
        Some(path) => VectorizeConfig::from_json_file(path)
            .with_context(|| format!("loading preset {}", path.display()))?,
        None => VectorizeConfig::default(),
    };
    if cli.serial {
        config.parallel = false;
    }
    if cli.pin_junctions {
        config.pin_junctions = true;
    }

    let threshold = match cli.threshold {
        Some(t) => ThresholdMethod::Fixed(t),
        None => ThresholdMethod::Otsu,
    };
    let skeleton = BinaryImage::load(&cli.input, threshold, cli.invert)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    info!(
        width = skeleton.width(),
        height = skeleton.height(),
        foreground = skeleton.count_foreground(),
        "loaded skeleton"
    );

    let vectors = skel2vec::vectorize_skeleton_with(&skeleton, &config);

    let style = SvgStyle {
        title: cli
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned()),
        ..SvgStyle::default()
    };
    std::fs::write(&cli.output, to_svg_document(&vectors, &style))
        .with_context(|| format!("writing {}", cli.output.display()))?;
    info!(path = %cli.output.display(), "wrote svg");

    if let Some(path) = &cli.json {
        std::fs::write(path, vectors.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote json");
    }

    if let Some(path) = &cli.compare {
        skel2vec::render::render_comparison(&skeleton, &vectors, path, cli.scale)
            .with_context(|| format!("rendering {}", path.display()))?;
        info!(path = %path.display(), "wrote comparison");
    }

    info!(
        paths = vectors.paths.len(),
        lines = vectors.line_count(),
        arcs = vectors.arc_count(),
        elapsed_ms = t_start.elapsed().as_millis() as u64,
        "done"
    );
    Ok(())
}
