mod commands;
mod progress;
mod summary;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::Context;

#[derive(Parser)]
#[command(name = "caldera", about = "Calibration master frames and sensor characterization")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project root holding the raw and processed data directories
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the raw calibration frames of a session
    Scan(commands::scan::ScanArgs),
    /// Combine raw frames into a master frame
    Combine(commands::combine::CombineArgs),
    /// Measure read noise, gain and full well from bias and flat pairs
    Characterize(commands::characterize::CharacterizeArgs),
    /// List or delete master frames
    #[command(subcommand)]
    Masters(commands::masters::MastersCommand),
    /// List the sensor profiles of a session
    Profiles(commands::profiles::ProfilesArgs),
    /// Show FITS/image file metadata and pixel statistics
    Info(commands::info::InfoArgs),
    /// Print the default configuration as TOML
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let ctx = || Context::load(&cli.project, cli.config.as_deref());
    match &cli.command {
        Commands::Scan(args) => commands::scan::run(args, &ctx()?),
        Commands::Combine(args) => commands::combine::run(args, &ctx()?),
        Commands::Characterize(args) => commands::characterize::run(args, &ctx()?),
        Commands::Masters(cmd) => commands::masters::run(cmd, &ctx()?),
        Commands::Profiles(args) => commands::profiles::run(args, &ctx()?),
        Commands::Info(args) => commands::info::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
