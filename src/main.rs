//! tempsync - central/external temperature averaging
//!
//! Entry point for the `tempsync` binary. `central` and `external` are the
//! two halves of a real deployment; `simulate` runs both halves in one process.

use std::path::Path;

use clap::Parser;
use tracing::{error, info, info_span, Instrument};

use tempsync::cli::{Cli, Commands, ConfigSubcommand};
use tempsync::config::{self, TempSyncConfig};
use tempsync::coordinator::{CentralSummary, Coordinator};
use tempsync::error::{Error, Result};
use tempsync::logging::{self, LogGuards};
use tempsync::peer::{External, ExternalSummary};
use tempsync::protocol::{ExternalId, NUM_EXTERNALS};
use tempsync::report::SessionReport;
use tempsync::{simulate, transport, version};

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!(error = %e.format_for_log(), mid_round = e.is_mid_round(), "Aborted");
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)
        }
        Commands::Central { initial_temp, net, max_rounds } => {
            let mut config = TempSyncConfig::load(net.config.as_deref())?;
            net.apply(&mut config);
            if let Some(max_rounds) = max_rounds {
                config.protocol.max_rounds = max_rounds;
            }
            config.validate()?;
            let _log_guards = start_logging(&config, cli.verbose, cli.quiet)?;

            let summary = run_central(&config, initial_temp)?;
            print_central_summary(&summary);
            Ok(())
        }
        Commands::External { index, initial_temp, net } => {
            let mut config = TempSyncConfig::load(net.config.as_deref())?;
            net.apply(&mut config);
            config.validate()?;
            let _log_guards = start_logging(&config, cli.verbose, cli.quiet)?;

            let summary = run_external(&config, index, initial_temp)?;
            println!(
                "External {} done after {} rounds: temperature {:.6} (central {:.6})",
                summary.index, summary.rounds, summary.final_external, summary.final_central
            );
            Ok(())
        }
        Commands::Simulate { central, externals, config, max_rounds, report } => {
            let mut config = TempSyncConfig::load(config.as_deref())?;
            if let Some(max_rounds) = max_rounds {
                config.protocol.max_rounds = max_rounds;
            }
            let _log_guards = start_logging(&config, cli.verbose, cli.quiet)?;

            let initial: [f32; NUM_EXTERNALS] = externals.try_into().map_err(|v: Vec<f32>| {
                Error::Internal(format!("expected {} external temperatures, got {}", NUM_EXTERNALS, v.len()))
            })?;

            let session = run_simulation(&config, central, initial)?;
            print_session(&session);
            if let Some(path) = report {
                session.write_json(Path::new(&path))?;
                println!("Report written to {}", path);
            }
            Ok(())
        }
    }
}

fn start_logging(config: &TempSyncConfig, verbose: u8, quiet: bool) -> Result<LogGuards> {
    let guards = logging::init_logging(&config.logging, verbose, quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting tempsync"
    );
    Ok(guards)
}

fn current_thread_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))
}

/// Bind, wait for all externals, coordinate until stable
fn run_central(config: &TempSyncConfig, initial: f32) -> Result<CentralSummary> {
    let rt = current_thread_runtime()?;
    rt.block_on(
        async {
            let listener = transport::bind(&config.network).await?;
            let mut channels = transport::accept_externals(&listener).await?;
            Coordinator::new(initial)
                .with_max_rounds(config.protocol.max_rounds)
                .run(&mut channels)
                .await
        }
        .instrument(info_span!("central")),
    )
}

/// Connect to the central and run rounds until told to stop
fn run_external(config: &TempSyncConfig, id: ExternalId, initial: f32) -> Result<ExternalSummary> {
    let rt = current_thread_runtime()?;
    rt.block_on(
        async {
            let mut channel = transport::connect_central(&config.network).await?;
            External::new(id, initial).run(&mut channel).await
        }
        .instrument(info_span!("external", index = %id)),
    )
}

fn run_simulation(
    config: &TempSyncConfig,
    central: f32,
    externals: [f32; NUM_EXTERNALS],
) -> Result<SessionReport> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))?;
    rt.block_on(simulate::run(config, central, externals).instrument(info_span!("simulate")))
}

fn print_central_summary(summary: &CentralSummary) {
    println!(
        "Stabilized after {} rounds: central temperature {:.6}",
        summary.rounds, summary.final_central
    );
    for id in ExternalId::all() {
        println!("  external {}: {:.6}", id, summary.final_externals[id.slot()]);
    }
}

fn print_session(session: &SessionReport) {
    println!("Session {}", session.session_id);
    println!(
        "Stabilized after {} rounds: central temperature {:.6}",
        session.rounds, session.final_central
    );
    for external in &session.externals {
        println!(
            "  external {}: {:.6} -> {:.6}",
            external.index, external.initial, external.final_value
        );
    }
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = TempSyncConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            TempSyncConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
