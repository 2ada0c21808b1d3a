mod annotation;
mod common;
mod convert;
mod draw;
mod error;
mod export;
mod gxl;
mod offset;
mod style;
mod viewer;
mod watch;

use anyhow::{anyhow, bail, ensure, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::convert::OutputMode;
use crate::draw::GraphDrawer;
use crate::gxl::ParsedGxlGraph;
use crate::offset::{Offset, OffsetSource};
use crate::style::StyleConfig;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw a GXL graph over a microscopy image and save the overlay
    Render(RenderArgs),
    /// Convert JSON annotation exports into ASAP XML documents
    Convert(ConvertArgs),
    /// Export the per-object measurement tables as CSV
    Metrics(MetricsArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// GXL graph file
    #[clap(short, long)]
    gxl: PathBuf,
    /// Base image the graph is drawn on
    #[clap(short, long)]
    image: Option<PathBuf>,
    /// Draw on a blank white canvas instead of an image
    #[clap(long)]
    blank: bool,
    /// Directory the visualization is written to
    #[clap(short, long, default_value = ".")]
    output: PathBuf,
    /// YAML style file; defaults to the built-in style
    #[clap(short, long)]
    style: Option<PathBuf>,
    /// Node feature to color the nodes by
    #[clap(long)]
    color_by: Option<String>,
    /// Scale factor applied to node coordinates
    #[clap(long, default_value_t = 1.0)]
    scaling: f64,
    /// Base image transparency, 0-255
    #[clap(long, default_value_t = 125)]
    transparency: u8,
    /// Node type whose style is used for every node
    #[clap(long)]
    node_type: Option<String>,
    /// Re-render when the graph, image or style file changes
    #[clap(short, long)]
    watch: bool,
}

#[derive(Args)]
struct ConvertArgs {
    /// Directory of the JSON data files
    #[clap(long)]
    input_files_folder: PathBuf,
    /// Directory of the output folder
    #[clap(long)]
    output_folder: PathBuf,
    /// Semicolon-delimited centroid table (id;x;y[;radius])
    #[clap(long, group = "offset_source")]
    coordinates_file: Option<PathBuf>,
    /// Slide bounds added to CSV centroid x values
    #[clap(long, default_value_t = 0.0)]
    bounds_x: f64,
    /// Slide bounds added to CSV centroid y values
    #[clap(long, default_value_t = 0.0)]
    bounds_y: f64,
    /// Directory of hotspot coordinate XML files
    #[clap(long, group = "offset_source")]
    hotspot_folder: Option<PathBuf>,
    /// Fixed offset as dx,dy
    #[clap(long, group = "offset_source", allow_hyphen_values = true)]
    offset: Option<String>,
    /// Radius subtracted from both axes of a fixed offset
    #[clap(long, default_value_t = 0.0)]
    radius: f64,
    /// Which documents to write
    #[clap(long, value_enum, default_value = "per-file")]
    mode: OutputModeArg,
}

#[derive(Args)]
struct MetricsArgs {
    /// Directory of the JSON data files
    #[clap(long)]
    input_files_folder: PathBuf,
    /// Directory of the output folder
    #[clap(long)]
    output_folder: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputModeArg {
    PerFile,
    Aggregate,
    Both,
}

impl From<OutputModeArg> for OutputMode {
    fn from(mode: OutputModeArg) -> Self {
        match mode {
            OutputModeArg::PerFile => OutputMode::PerFile,
            OutputModeArg::Aggregate => OutputMode::Aggregate,
            OutputModeArg::Both => OutputMode::Both,
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Render(render) => {
            ensure!(
                render.image.is_some() || render.blank,
                "no base image given; pass --image or --blank"
            );
            run_render(&render)?;
            if render.watch {
                let mut files = vec![render.gxl.clone()];
                files.extend(render.image.clone());
                files.extend(render.style.clone());
                watch::watch_and_rerun(&files, || run_render(&render))?;
            }
        }
        Commands::Convert(convert_args) => {
            let source = offset_source(&convert_args)?;
            let summary = convert::run_conversion(
                &convert_args.input_files_folder,
                &convert_args.output_folder,
                &source,
                convert_args.mode.into(),
            )?;
            info!(
                "Done: {} written, {} skipped",
                summary.written.len(),
                summary.skipped.len()
            );
        }
        Commands::Metrics(metrics) => {
            let summary = convert::run_metrics_export(
                &metrics.input_files_folder,
                &metrics.output_folder,
            )?;
            info!(
                "Done: {} written, {} skipped",
                summary.written.len(),
                summary.skipped.len()
            );
        }
    }

    Ok(())
}

/// One render pass: parse, style, draw, save.
fn run_render(args: &RenderArgs) -> Result<()> {
    let graph = ParsedGxlGraph::from_file(&args.gxl, args.color_by.as_deref())
        .with_context(|| format!("failed to parse {}", args.gxl.display()))?;
    info!("Loaded graph {} ({})", graph.graph_id, graph.stats());

    let mut style = match &args.style {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_yaml::from_str::<StyleConfig>(&text)
                .with_context(|| format!("invalid style file {}", path.display()))?
        }
        None if args.color_by.is_some() => StyleConfig::from_feature_values(&graph.color_by_values),
        None => StyleConfig::default(),
    };
    if let Some(node_type) = &args.node_type {
        if !style.select_node_type(node_type) {
            bail!("node type {:?} has no style bucket", node_type);
        }
    }

    let base = args
        .image
        .as_ref()
        .map(|path| image::open(path).with_context(|| format!("failed to open {}", path.display())))
        .transpose()?;

    std::fs::create_dir_all(&args.output)?;
    let drawer = GraphDrawer::new(&graph, base, &style, args.scaling, args.transparency);
    drawer.save(&args.output)?;
    Ok(())
}

/// Build the offset strategy from the mutually exclusive CLI flags.
fn offset_source(args: &ConvertArgs) -> Result<OffsetSource> {
    if let Some(path) = &args.coordinates_file {
        ensure!(path.is_file(), "{} is not a file", path.display());
        ensure!(
            path.extension().and_then(|e| e.to_str()) == Some("csv"),
            "{} is not a csv file",
            path.display()
        );
        return Ok(OffsetSource::CentroidCsv {
            path: path.clone(),
            bounds_x: args.bounds_x,
            bounds_y: args.bounds_y,
        });
    }
    if let Some(dir) = &args.hotspot_folder {
        ensure!(dir.is_dir(), "{} is not a directory", dir.display());
        return Ok(OffsetSource::HotspotDir(dir.clone()));
    }
    if let Some(offset) = &args.offset {
        let (dx, dy) = parse_offset(offset)?;
        return Ok(OffsetSource::Constant(Offset::new(dx, dy, args.radius)));
    }
    Ok(OffsetSource::Constant(Offset::ZERO))
}

fn parse_offset(value: &str) -> Result<(f64, f64)> {
    let (dx, dy) = value
        .split_once(',')
        .ok_or_else(|| anyhow!("offset must be dx,dy, got {:?}", value))?;
    Ok((
        dx.trim()
            .parse()
            .map_err(|_| anyhow!("invalid offset x {:?}", dx))?,
        dy.trim()
            .parse()
            .map_err(|_| anyhow!("invalid offset y {:?}", dy))?,
    ))
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .without_time()
        .init();
}
