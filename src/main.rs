//! interconnect-fixture: MCP server generating test fixtures and footprints
//! for a 100-pin interconnect chip.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use interconnect_fixture::config::{self, Config};
use interconnect_fixture::error::ConfigError;
use interconnect_fixture::mcp::server::McpServer;

/// MCP server for interconnect chip fixture generation.
///
/// Loads a chip description, lets the client group outer pins into
/// connections, and generates fixture or footprint circuits.
#[derive(Parser, Debug)]
#[command(name = "interconnect-fixture")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Chip description to load at startup (overrides `chip_path`)
    #[arg(long, value_name = "CHIP_FILE")]
    chip: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the configuration. A missing default file means all defaults.
fn load_config(path: Option<&std::path::Path>) -> Result<(Config, bool), ConfigError> {
    match config::load_config(path) {
        Ok(cfg) => Ok((cfg, true)),
        Err(ConfigError::NotFound { .. }) if path.is_none() => Ok((Config::default(), false)),
        Err(e) => Err(e),
    }
}

/// Entry point for the interconnect-fixture server.
fn main() -> ExitCode {
    let args = Args::parse();

    let (cfg, from_file) = match load_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    if !from_file {
        warn!(
            expected = ?config::default_config_path(),
            "No configuration file found, using defaults"
        );
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting interconnect-fixture server"
    );

    let allowed_paths = if cfg.allowed_paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cfg.allowed_paths
    };

    info!(allowed_paths = ?allowed_paths, "Allowed paths configured");

    let mut server = McpServer::new(allowed_paths, cfg.layout);

    if let Some(chip_path) = args.chip.or(cfg.chip_path) {
        if let Err(e) = server.session_mut().load_chip(&chip_path) {
            error!(path = %chip_path.display(), error = %e, "Failed to load chip");
            return ExitCode::FAILURE;
        }
    }

    info!("MCP server ready, waiting for client connection...");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(server.run()) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn verbosity_overrides_config_level() {
        assert_eq!(get_log_level(0, false, "debug"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "bogus"), Level::WARN);
        assert_eq!(get_log_level(2, false, "error"), Level::DEBUG);
        assert_eq!(get_log_level(3, true, "trace"), Level::ERROR);
    }
}
