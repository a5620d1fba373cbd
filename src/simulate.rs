//! Whole-system run in one process
//!
//! Binds the central on an OS-assigned loopback port, spawns the four
//! externals as tasks that connect to it over real TCP, and drives the
//! protocol to completion.

use chrono::Utc;
use futures_util::future::try_join_all;
use tracing::{info, warn};

use crate::config::{NetworkSettings, TempSyncConfig};
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::peer::External;
use crate::protocol::{ExternalId, NUM_EXTERNALS};
use crate::report::SessionReport;
use crate::transport;

/// Run a complete session and return its report
pub async fn run(
    config: &TempSyncConfig,
    initial_central: f32,
    initial_externals: [f32; NUM_EXTERNALS],
) -> Result<SessionReport> {
    let started_at = Utc::now();

    let listen = NetworkSettings {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..config.network.clone()
    };
    let listener = transport::bind(&listen).await?;
    let port = listener.local_addr()?.port();
    let connect = NetworkSettings { port, ..listen };

    info!(port, central = initial_central, externals = ?initial_externals, "Simulation starting");

    let handles: Vec<_> = ExternalId::all()
        .map(|id| {
            let settings = connect.clone();
            let initial = initial_externals[id.slot()];
            tokio::spawn(async move {
                let mut channel = transport::connect_central(&settings).await?;
                External::new(id, initial).run(&mut channel).await
            })
        })
        .collect();

    let mut channels = transport::accept_externals(&listener).await?;
    let coordinator = Coordinator::new(initial_central).with_max_rounds(config.protocol.max_rounds);
    let central = coordinator.run(&mut channels).await;

    // Externals blocked on a reply only see the failure once the sockets close
    drop(channels);

    let joined = try_join_all(handles)
        .await
        .map_err(|e| Error::Internal(format!("external task failed: {}", e)))?;

    let central = central?;
    let mut externals = Vec::with_capacity(NUM_EXTERNALS);
    for result in joined {
        match result {
            Ok(summary) => externals.push(summary),
            Err(e) => {
                warn!(error = %e.format_for_log(), "External ended with an error");
                return Err(e);
            }
        }
    }

    let report = SessionReport::new(started_at, initial_central, initial_externals, &central, &externals);
    info!(
        session = %report.session_id,
        rounds = report.rounds,
        central = report.final_central,
        spread = report.spread(),
        "Simulation finished"
    );
    Ok(report)
}
