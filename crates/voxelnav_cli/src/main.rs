//! Builds navmeshes from OBJ files and runs searches on them.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use glam::Vec3A;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod input;

#[derive(Parser, Debug)]
#[command(name = "voxelnav")]
#[command(about = "Builds navmeshes from triangle meshes and searches paths on them")]
#[command(version)]
struct Cli {
    /// Log filter used when `RUST_LOG` is not set.
    #[arg(short, long, value_name = "FILTER", default_value = "info", global = true)]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Builds a navmesh and prints a summary.
    Build(BuildArgs),
    /// Builds a navmesh and searches a path on it.
    Path(PathArgs),
}

#[derive(Args, Debug)]
struct SceneArgs {
    /// OBJ files making up the level.
    #[arg(required = true)]
    meshes: Vec<PathBuf>,

    /// JSON file with navmesh settings. Missing fields keep their defaults.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use the bounds of the meshes instead of the configured bounds.
    #[arg(long)]
    fit_bounds: bool,
}

#[derive(Args, Debug)]
struct BuildArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Writes the navmesh as a Wavefront OBJ file.
    #[arg(short, long, value_name = "FILE")]
    export: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PolicyArg {
    /// The cheapest path from `--from` to `--to`.
    Shortest,
    /// A path of about `--length` in a random direction from `--from`.
    Random,
    /// A path of about `--length` from `--from`, away from `--to`.
    Flee,
    /// Floods the navmesh from `--to`, then traces back from `--from`.
    Flood,
}

#[derive(Args, Debug)]
struct PathArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Where the path starts, as `x,y,z`.
    #[arg(long, value_parser = input::parse_point, allow_hyphen_values = true)]
    from: Vec3A,

    /// Where the path ends, or the point to flee from, as `x,y,z`.
    #[arg(long, value_parser = input::parse_point, allow_hyphen_values = true)]
    to: Option<Vec3A>,

    /// Which search to run.
    #[arg(short, long, value_enum, default_value_t = PolicyArg::Shortest)]
    policy: PolicyArg,

    /// Minimum length of random and flee paths, in world units.
    #[arg(long, default_value_t = 10.0)]
    length: f32,

    /// Seed for random and flee paths.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Time given to the searches per tick, in milliseconds.
    #[arg(long, default_value_t = 2)]
    budget_ms: u64,

    /// Keeps the path on node centers instead of pulling it taut.
    #[arg(long)]
    no_smoothing: bool,

    /// Prints the path as JSON.
    #[arg(long)]
    json: bool,
}

fn initialize_logging(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli.log);
    match cli.command {
        Command::Build(args) => commands::build(args),
        Command::Path(args) => commands::path(args),
    }
}
