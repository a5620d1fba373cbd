//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for tempsync.

use clap::{Args, Parser, Subcommand};

use crate::config::TempSyncConfig;
use crate::protocol::{is_valid_temperature, ExternalId, MAX_TEMPERATURE};

/// tempsync - iterative temperature averaging over TCP
///
/// One central process and four external processes exchange temperatures
/// in lock-step rounds until every value stops moving.
#[derive(Parser, Debug)]
#[command(name = "tempsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the central process: wait for four externals, then coordinate
    Central {
        /// Starting central temperature
        #[arg(allow_negative_numbers = true, value_parser = parse_temperature)]
        initial_temp: f32,

        #[command(flatten)]
        net: NetworkArgs,

        /// Give up after this many rounds (0 = run until stable)
        #[arg(long)]
        max_rounds: Option<u64>,
    },

    /// Run one external process
    External {
        /// External index (1-4)
        #[arg(value_parser = parse_external_id)]
        index: ExternalId,

        /// Starting external temperature
        #[arg(allow_negative_numbers = true, value_parser = parse_temperature)]
        initial_temp: f32,

        #[command(flatten)]
        net: NetworkArgs,
    },

    /// Run the central and all four externals in this process over loopback TCP
    Simulate {
        /// Starting central temperature
        #[arg(allow_negative_numbers = true, value_parser = parse_temperature)]
        central: f32,

        /// Starting temperatures of externals 1 to 4
        #[arg(
            num_args = 4,
            value_names = ["E1", "E2", "E3", "E4"],
            allow_negative_numbers = true,
            required = true,
            value_parser = parse_temperature
        )]
        externals: Vec<f32>,

        /// Path to configuration file
        #[arg(short, long, env = "TEMPSYNC_CONFIG")]
        config: Option<String>,

        /// Give up after this many rounds (0 = run until stable)
        #[arg(long)]
        max_rounds: Option<u64>,

        /// Write a JSON session report to this path
        #[arg(long)]
        report: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Where to find the configuration and the central
#[derive(Args, Debug, Clone, Default)]
pub struct NetworkArgs {
    /// Path to configuration file
    #[arg(short, long, env = "TEMPSYNC_CONFIG")]
    pub config: Option<String>,

    /// Host of the central (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port of the central (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl NetworkArgs {
    /// Apply CLI overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut TempSyncConfig) {
        if let Some(ref host) = self.host {
            config.network.host = host.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
    }
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn parse_external_id(s: &str) -> Result<ExternalId, String> {
    let index: u8 = s
        .parse()
        .map_err(|_| format!("'{}' is not an external index", s))?;
    ExternalId::try_from(index)
}

fn parse_temperature(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a temperature", s))?;
    if !is_valid_temperature(value) {
        return Err(format!(
            "temperature must be finite and within ±{:e}, got {}",
            MAX_TEMPERATURE, s
        ));
    }
    Ok(value)
}
