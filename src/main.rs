use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use hull_voltage::{
    construct_phase_diagram, parser, writer, HullConfig, MemoryStore, PhaseDiagram, QueryFilter, TernaryDistanceMode,
};

#[derive(Parser)]
#[command(author, version, about = "Convex-hull phase diagrams and intercalation voltages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct HullArgs {
    /// Elements of the hull, guest first (e.g. "LiSn" or "LiSnS").
    #[arg(short, long)]
    composition: String,

    /// Glob pattern of JSON structure documents.
    #[arg(short, long)]
    input: String,

    /// Keep structures up to this many eV/atom above the hull.
    #[arg(long)]
    hull_cutoff: Option<f64>,

    /// Keep structures within k_B T of the hull.
    #[arg(long)]
    hull_temp: Option<f64>,

    /// Manual chemical potentials (eV/atom), one per element.
    #[arg(long, num_args = 1.., allow_negative_numbers = true)]
    chempots: Option<Vec<f64>>,

    /// Include every sub-system of the composition (required for ternaries).
    #[arg(long = "intersection", visible_alias = "int")]
    intersection: bool,

    /// Distance 1.0 for every ternary non-vertex instead of the facet projection.
    #[arg(long)]
    legacy_ternary: bool,

    /// Only use documents carrying all of these tags.
    #[arg(long, num_args = 1..)]
    tags: Vec<String>,

    /// Accept documents flagged as poor quality.
    #[arg(long)]
    include_poor_quality: bool,

    /// Write the diagram as JSON.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds the convex hull and lists the near-hull structures.
    Hull {
        #[command(flatten)]
        args: HullArgs,
    },
    /// Builds the hull, then derives voltage (and volume) curves.
    Voltage {
        #[command(flatten)]
        args: HullArgs,

        /// Also print the volume expansion curve (binary only).
        #[arg(long)]
        volume: bool,
    },
}

fn build(args: &HullArgs) -> Result<PhaseDiagram> {
    let mut config = HullConfig::from_parts(&args.composition, args.hull_cutoff, args.hull_temp)?;
    config.chempots = args.chempots.clone();
    config.intersection = args.intersection;
    config.ternary_distance = if args.legacy_ternary {
        TernaryDistanceMode::Legacy
    } else {
        TernaryDistanceMode::FacetProjection
    };
    config.filter = QueryFilter {
        tags: args.tags.clone(),
        include_poor_quality: args.include_poor_quality,
    };

    println!("Reading structures from {}...", args.input);
    let docs = parser::from_glob(&args.input)?;
    println!("-> Loaded {} structures.", docs.len());

    let store = MemoryStore::new(docs);
    let (diagram, report) = construct_phase_diagram(store.documents(), &store, &config)?;
    println!("\n{}", report);

    if let Some(output) = &args.output {
        println!("Writing output to {:?}...", output);
        writer::to_json(&diagram, output)?;
    }
    Ok(diagram)
}

fn print_voltages(diagram: &PhaseDiagram) -> Result<()> {
    let profiles = diagram.voltage_profiles()?;
    if profiles.is_empty() {
        println!("No voltage curve could be derived.");
        return Ok(());
    }
    for profile in &profiles {
        println!("\n--- Voltage Profile from {} ---", profile.starting_formula);
        println!("{:>10}{:>14}{:>12}", "x", "Q (mAh/g)", "V (V)");
        for (x, point) in profile.x.iter().zip(profile.points()) {
            let x = x.map_or_else(|| "∞".to_string(), |x| format!("{:.3}", x));
            let q = point.capacity.map_or_else(|| "-".to_string(), |q| format!("{:.1}", q));
            println!("{:>10}{:>14}{:>12.4}", x, q, point.voltage);
        }
        for phases in &profile.reactions {
            println!("  {}", phases.join(" + "));
        }
        if let Some(average) = profile.average_voltage() {
            println!("• Average voltage: {:.4} V", average);
        }
    }
    Ok(())
}

fn print_volume(diagram: &PhaseDiagram) {
    let Some(curve) = diagram.volume_curve() else {
        println!("Volume curves are only available for binary hulls.");
        return;
    };
    println!("\n--- Volume Expansion ---");
    println!("{:>10}{:>14}{:>8}", "x", "V/V_host", "stable");
    for ((x, ratio), stable) in curve.x.iter().zip(&curve.volume_ratio).zip(&curve.stable) {
        println!("{:>10.3}{:>14.4}{:>8}", x, ratio, if *stable { "yes" } else { "" });
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let start_time = Instant::now();

    println!("--- Hull Voltage ---");
    match cli.command {
        Commands::Hull { args } => {
            build(&args)?;
        }
        Commands::Voltage { args, volume } => {
            let diagram = build(&args)?;
            print_voltages(&diagram)?;
            if volume {
                print_volume(&diagram);
            }
        }
    }

    println!("Done in {:.2?}", start_time.elapsed());
    Ok(())
}
