//! Cutout CLI - clip a JSON layout to the region around a set of nets.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use cutout::{
    ClipperKernel, CutoutCore, CutoutError, CutoutOptions, CutoutResult, ExtentType,
    LayoutDatabase, LayoutStore, LayoutSummary, LengthUnit,
};
use std::path::{Path, PathBuf};
use std::process;

/// Exit code for a cutout that ran but could not meet its post-conditions.
const EXIT_CUTOUT_FAILED: i32 = 2;

#[derive(Parser)]
#[command(name = "cutout")]
#[command(about = "Layout cutout tool: keep the nets you simulate, clip the rest", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cut a layout down to the extent around the signal nets
    Run {
        #[command(flatten)]
        selection: NetSelection,

        #[command(flatten)]
        extent: ExtentArgs,

        /// Retry with growing expansion until port references stay connected
        #[arg(long)]
        smart: bool,

        /// Attempts the smart loop may spend
        #[arg(long, value_name = "N")]
        max_iterations: Option<usize>,

        /// Base expansion = factor * max(widest port trace, thickest dielectric)
        #[arg(long, value_name = "FACTOR")]
        expansion_factor: Option<f64>,

        /// Use the layout database's own cutout instead of the pipeline
        #[arg(long)]
        native: bool,

        /// Keep padstack instances that straddle the extent boundary
        #[arg(long)]
        include_partial: bool,

        /// Keep every pin and net of components with a behavioural model
        #[arg(long)]
        preserve_models: bool,

        /// Drop passives left with a single pin
        #[arg(long)]
        remove_single_pin: bool,

        /// Worker threads for the compute phase
        #[arg(long, value_name = "N")]
        threads: Option<usize>,

        /// Write the result here instead of overwriting the input
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Print the extent a run would use, without touching the layout
    Extent {
        #[command(flatten)]
        selection: NetSelection,

        #[command(flatten)]
        extent: ExtentArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Summarise a layout file
    Info {
        /// Path to a JSON layout
        #[arg(value_name = "LAYOUT")]
        layout: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct NetSelection {
    /// Path to a JSON layout
    #[arg(value_name = "LAYOUT")]
    layout: PathBuf,

    /// Signal nets, comma separated (default: every non-reference net)
    #[arg(short, long, value_delimiter = ',')]
    signals: Vec<String>,

    /// Reference nets, comma separated
    #[arg(short, long, value_delimiter = ',')]
    references: Vec<String>,

    /// JSON file with cutout options; flags override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ExtentArgs {
    /// convex-hull, conforming or bounding-box
    #[arg(long, value_parser = parse_extent_type)]
    extent_type: Option<ExtentType>,

    /// Expansion around the signal geometry, meters
    #[arg(short = 'e', long, value_name = "METERS")]
    expansion_size: Option<f64>,

    /// Round corners when expanding
    #[arg(long)]
    round_corners: bool,

    /// Custom extent polygon "x,y;x,y;..." in --units
    #[arg(long, value_name = "POINTS", value_parser = parse_points)]
    custom_extent: Option<Polygon>,

    /// Units of --custom-extent (m, mm, um, mil, ...)
    #[arg(long, value_parser = parse_unit)]
    units: Option<LengthUnit>,
}

/// Polygon given on the command line.
#[derive(Debug, Clone, PartialEq)]
struct Polygon(Vec<[f64; 2]>);

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts
    Json,
}

fn parse_extent_type(s: &str) -> Result<ExtentType, String> {
    s.parse()
}

fn parse_unit(s: &str) -> Result<LengthUnit, String> {
    s.parse().map_err(|e: cutout::units::UnknownUnit| e.to_string())
}

fn parse_points(s: &str) -> Result<Polygon, String> {
    s.split(';')
        .filter(|p| !p.trim().is_empty())
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| format!("expected 'x,y', got '{}'", pair))?;
            let parse = |v: &str| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|e| format!("bad coordinate '{}': {}", v, e))
            };
            Ok([parse(x)?, parse(y)?])
        })
        .collect::<Result<Vec<_>, String>>()
        .map(Polygon)
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match cli.command {
        Commands::Run {
            selection,
            extent,
            smart,
            max_iterations,
            expansion_factor,
            native,
            include_partial,
            preserve_models,
            remove_single_pin,
            threads,
            output,
            format,
        } => {
            let overrides = RunOverrides {
                smart,
                max_iterations,
                expansion_factor,
                native,
                include_partial,
                preserve_models,
                remove_single_pin,
                threads,
                output,
            };
            handle_run(&selection, &extent, &overrides, format)
        }
        Commands::Extent {
            selection,
            extent,
            format,
        } => handle_extent(&selection, &extent, format),
        Commands::Info { layout, format } => handle_info(&layout, format),
    };

    process::exit(exit_code);
}

struct RunOverrides {
    smart: bool,
    max_iterations: Option<usize>,
    expansion_factor: Option<f64>,
    native: bool,
    include_partial: bool,
    preserve_models: bool,
    remove_single_pin: bool,
    threads: Option<usize>,
    output: Option<PathBuf>,
}

fn load_options(config: Option<&Path>) -> Result<CutoutOptions> {
    let Some(path) = config else {
        return Ok(CutoutOptions::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

fn apply_extent_args(options: &mut CutoutOptions, args: &ExtentArgs) {
    if let Some(extent_type) = args.extent_type {
        options.extent_type = extent_type;
    }
    if let Some(size) = args.expansion_size {
        options.expansion_size = size;
    }
    if args.round_corners {
        options.use_round_corner = true;
    }
    if let Some(Polygon(points)) = &args.custom_extent {
        options.custom_extent = Some(points.clone());
    }
    if let Some(units) = args.units {
        options.custom_extent_units = units;
    }
}

fn apply_run_overrides(options: &mut CutoutOptions, overrides: &RunOverrides) {
    options.smart_cutout |= overrides.smart;
    options.use_native_cutout |= overrides.native;
    options.include_partial_instances |= overrides.include_partial;
    options.preserve_components_with_model |= overrides.preserve_models;
    options.remove_single_pin_components |= overrides.remove_single_pin;
    if let Some(n) = overrides.max_iterations {
        options.maximum_iterations = n;
    }
    if let Some(factor) = overrides.expansion_factor {
        options.expansion_factor = factor;
    }
    if let Some(threads) = overrides.threads {
        options.number_of_threads = threads;
    }
    if let Some(output) = &overrides.output {
        options.output_path = Some(output.clone());
    }
}

fn open_layout(path: &Path) -> Result<LayoutDatabase> {
    LayoutDatabase::open(path).with_context(|| format!("opening layout {}", path.display()))
}

fn run_cutout(
    selection: &NetSelection,
    extent: &ExtentArgs,
    overrides: &RunOverrides,
) -> Result<CutoutResult> {
    let mut options = load_options(selection.config.as_deref())?;
    apply_extent_args(&mut options, extent);
    apply_run_overrides(&mut options, overrides);

    let mut layout = open_layout(&selection.layout)?;
    let result = CutoutCore::run(
        &mut layout,
        &ClipperKernel::new(),
        &selection.signals,
        &selection.references,
        &options,
    )?;
    Ok(result)
}

/// 2 for a cutout that ran but failed its checks, 1 for anything else.
fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<CutoutError>() {
        Some(CutoutError::ConnectivityPostCondition { .. })
        | Some(CutoutError::IterationBudgetExhausted { .. }) => EXIT_CUTOUT_FAILED,
        _ => 1,
    }
}

fn handle_run(
    selection: &NetSelection,
    extent: &ExtentArgs,
    overrides: &RunOverrides,
    format: OutputFormat,
) -> i32 {
    match run_cutout(selection, extent, overrides) {
        Ok(result) => {
            match format {
                OutputFormat::Human => output_run_human(&selection.layout, &result),
                OutputFormat::Json => print_json(&result),
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

fn compute_extent(selection: &NetSelection, extent: &ExtentArgs) -> Result<Vec<[f64; 2]>> {
    let mut options = load_options(selection.config.as_deref())?;
    apply_extent_args(&mut options, extent);
    let layout = open_layout(&selection.layout)?;
    let ring = CutoutCore::compute_extent(
        &layout,
        &ClipperKernel::new(),
        &selection.signals,
        &selection.references,
        &options,
    )?;
    Ok(ring)
}

fn handle_extent(selection: &NetSelection, extent: &ExtentArgs, format: OutputFormat) -> i32 {
    match compute_extent(selection, extent) {
        Ok(ring) => {
            match format {
                OutputFormat::Human => {
                    println!("Extent of {} ({} points):", selection.layout.display(), ring.len());
                    for [x, y] in &ring {
                        println!("  {:.6} {:.6}", x, y);
                    }
                }
                OutputFormat::Json => print_json(&serde_json::json!({ "boundary": ring })),
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn summarize(path: &Path) -> Result<LayoutSummary> {
    let layout = open_layout(path)?;
    Ok(layout.summary(&ClipperKernel::new())?)
}

fn handle_info(path: &Path, format: OutputFormat) -> i32 {
    match summarize(path) {
        Ok(summary) => {
            match format {
                OutputFormat::Human => output_summary_human(path, &summary),
                OutputFormat::Json => print_json(&summary),
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: could not serialise output: {}", e),
    }
}

fn output_run_human(layout: &Path, result: &CutoutResult) {
    println!("\nCutout: {}", layout.display());
    println!("{}", "─".repeat(60));
    println!("  Iterations:     {}", result.iterations);
    println!("  Expansion:      {} m", result.expansion_size);
    println!("  Boundary:       {} points", result.boundary.len());
    match &result.output_path {
        Some(path) => println!("  Saved to:       {}", path.display()),
        None => println!("  Saved to:       (not saved)"),
    }

    let s = &result.stats;
    println!("\n  Removed:");
    println!("    Nets:         {}", s.deleted_nets);
    println!("    Instances:    {}", s.deleted_instances);
    println!("    Primitives:   {} ({} voids)", s.deleted_primitives, s.deleted_voids);
    println!(
        "    Components:   {} (+{} single-pin)",
        s.deleted_components, s.deleted_single_pin_components
    );
    println!("\n  Created:");
    println!("    Polygons:     {}", s.created_polygons);
    println!("    Paths:        {}", s.created_paths);
    if s.clip_failures > 0 {
        println!("\n  Kept unclipped after geometry errors: {}", s.clip_failures);
    }
    println!("\n  Took {:.1} ms (run {})", result.elapsed_ms, result.run_id);
}

fn output_summary_human(path: &Path, summary: &LayoutSummary) {
    println!("\nLayout: {}", path.display());
    println!("{}", "─".repeat(60));
    println!("  Cell:           {}", summary.cell);
    println!("  Nets:           {}", summary.nets);
    println!("  Primitives:     {} ({} voids)", summary.primitives, summary.voids);
    println!("  Instances:      {}", summary.padstack_instances);
    println!("  Components:     {}", summary.components);
    println!("  Ports:          {}", summary.ports);
    if let Some(bbox) = &summary.bounding_box {
        println!(
            "  Extent:         ({:.6}, {:.6}) - ({:.6}, {:.6})",
            bbox.min.x, bbox.min.y, bbox.max.x, bbox.max.y
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_points() {
        let Polygon(pts) = parse_points("0,0; 10,0;10,5;0,5").unwrap();
        assert_eq!(pts, vec![[0.0, 0.0], [10.0, 0.0], [10.0, 5.0], [0.0, 5.0]]);
        assert!(parse_points("0;1").is_err());
        assert!(parse_points("a,1").is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let mut options = CutoutOptions {
            expansion_size: 0.005,
            maximum_iterations: 3,
            ..Default::default()
        };
        let extent = ExtentArgs {
            extent_type: Some(ExtentType::BoundingBox),
            expansion_size: None,
            round_corners: false,
            custom_extent: None,
            units: None,
        };
        apply_extent_args(&mut options, &extent);
        let overrides = RunOverrides {
            smart: true,
            max_iterations: Some(7),
            expansion_factor: None,
            native: false,
            include_partial: false,
            preserve_models: false,
            remove_single_pin: false,
            threads: None,
            output: None,
        };
        apply_run_overrides(&mut options, &overrides);
        assert_eq!(options.extent_type, ExtentType::BoundingBox);
        assert_eq!(options.expansion_size, 0.005);
        assert!(options.smart_cutout);
        assert_eq!(options.maximum_iterations, 7);
    }

    #[test]
    fn test_budget_errors_map_to_cutout_failure_code() {
        let err = anyhow::Error::new(CutoutError::IterationBudgetExhausted {
            iterations: 3,
            expansion_size: 0.003,
            elapsed_ms: 1.0,
        });
        assert_eq!(exit_code_for(&err), EXIT_CUTOUT_FAILED);
        let other = anyhow::Error::new(CutoutError::InvalidOptions("x".into()));
        assert_eq!(exit_code_for(&other), 1);
    }
}
