//! Marble Rush - Headless marble race
//!
//! Simulates a field of marbles racing down a winding 3D track and produces
//! per-frame render state: racer placements, a chase camera pose, race status
//! and announcer commentary.

pub mod config;
pub mod game_server;
pub mod host;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::SimConfig;
use host::HostOptions;

/// Log filter used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "marble_rush=info,marble_rush_lib=info";

#[derive(Parser, Debug)]
#[command(name = "marble-rush", about = "Headless marble race simulator")]
struct Args {
    /// Config file path (TOML); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// RNG seed, overrides the config file
    #[arg(long)]
    seed: Option<u64>,
    /// Races to run before exiting
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    rounds: u32,
    /// Lobby size to wait for with the simulated chat
    #[arg(long, default_value_t = 8)]
    racers: usize,
    /// Comma-separated racer names instead of the simulated chat
    #[arg(long, value_delimiter = ',')]
    names: Vec<String>,
    /// Simulation speed multiplier (1.0 = real time)
    #[arg(long, default_value_t = 1.0)]
    speed: f32,
    /// Print final results as JSON
    #[arg(long)]
    json: bool,
}

/// Entry point for the `marble-rush` binary
pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    log::info!(
        "Marble Rush starting: {} round(s) at {}x speed",
        args.rounds,
        args.speed
    );

    let options = HostOptions {
        rounds: args.rounds,
        racers: args.racers,
        names: args.names,
        speed: args.speed,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_time().build()?;
    let summaries = runtime.block_on(host::drive(config, options))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_filter_covers_binary_and_library() {
        let filter = EnvFilter::try_new(DEFAULT_LOG_FILTER).unwrap();
        let rendered = filter.to_string().to_lowercase();
        assert!(rendered.contains("marble_rush=info"));
        assert!(rendered.contains("marble_rush_lib=info"));
    }

    #[test]
    fn cli_parses_names_and_seed() {
        let argv = ["marble-rush", "--seed", "4", "--names", "a,b,c"];
        let args = Args::try_parse_from(argv).unwrap();
        assert_eq!(args.seed, Some(4));
        assert_eq!(args.names, vec!["a", "b", "c"]);
        assert_eq!(args.rounds, 1);
        assert!(Args::try_parse_from(["marble-rush", "--rounds", "0"]).is_err());
    }
}
