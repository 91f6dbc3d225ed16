//! GeoVisit CLI - Command-line interface
//!
//! Offline tools over the geovisit library: write a default config, measure
//! distances, replay recorded location events through the visit pipeline, and
//! reduce a position trail to its significant points.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use commands::common::{load_config, start_logging};
use commands::replay::ReplayArgs;
use commands::significant::SignificantArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "geovisit", version, about = "Geofence visit tracking")]
struct Cli {
    /// Config file (default: platform config dir, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a config file populated with defaults
    Init {
        /// Where to write (default: platform config dir)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Great-circle distance in meters between two points
    #[command(allow_negative_numbers = true)]
    Distance {
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
    },

    /// Replay location events and print the resulting visits as JSON lines
    Replay {
        /// JSON array of zones ({name, latitude, longitude, radius_meters})
        #[arg(long)]
        zones: PathBuf,

        /// File with one location event payload per line
        #[arg(long)]
        events: PathBuf,

        /// Number of ingestion workers (overrides the config)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Print the significant points of a position trail as JSON
    Significant {
        /// JSON array of positions ({entity_id, latitude, longitude, observed_at})
        #[arg(long)]
        positions: PathBuf,

        /// Window start, RFC 3339
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Window end, RFC 3339
        #[arg(long, requires = "from")]
        to: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Init { path, force } => {
            let path = commands::init::run(path, force)?;
            println!("Wrote default configuration to {}", path.display());
        }
        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => {
            let meters = commands::distance::run(lat1, lon1, lat2, lon2)?;
            println!("{:.1} m", meters);
        }
        Commands::Replay {
            zones,
            events,
            workers,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let _guard = start_logging(&config.logging, cli.verbose)?;
            let visits = commands::replay::run(
                ReplayArgs {
                    zones,
                    events,
                    workers,
                },
                &config,
            )?;
            for visit in &visits {
                print_json(visit)?;
            }
        }
        Commands::Significant {
            positions,
            from,
            to,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let _guard = start_logging(&config.logging, cli.verbose)?;
            let significant = commands::significant::run(
                SignificantArgs {
                    positions,
                    from,
                    to,
                },
                &config,
            )?;
            print_json(&significant)?;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string(value)
        .map_err(|e| CliError::Input(format!("Failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}
