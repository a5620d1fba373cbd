//! TCP plumbing for the central and the externals
//!
//! The central binds, then accepts exactly one connection per external.
//! Externals may start before the central is listening, so connecting
//! retries with exponential backoff until the configured timeout.

use std::io::ErrorKind;
use std::net::SocketAddr;

use backoff::{backoff::Backoff, ExponentialBackoff};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::channel::StreamChannel;
use crate::config::NetworkSettings;
use crate::error::{Error, Result};
use crate::protocol::NUM_EXTERNALS;

/// Channel type used on real sockets
pub type TcpChannel = StreamChannel<TcpStream>;

/// Bind the central's listener
pub async fn bind(settings: &NetworkSettings) -> Result<TcpListener> {
    let addr = settings.address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::connection_failed(&addr, format!("bind failed: {}", e)))?;

    let local = listener.local_addr()?;
    info!(addr = %local, "Central listening");
    Ok(listener)
}

/// Accept one connection per external, in arrival order
///
/// Arrival order says nothing about identity; the coordinator places
/// reports by the index each external sends.
pub async fn accept_externals(listener: &TcpListener) -> Result<Vec<TcpChannel>> {
    let mut channels = Vec::with_capacity(NUM_EXTERNALS);

    while channels.len() < NUM_EXTERNALS {
        let (stream, peer_addr) = listener.accept().await?;
        configure(&stream, peer_addr);

        let slot = channels.len() + 1;
        info!(peer_addr = %peer_addr, connection = slot, of = NUM_EXTERNALS, "External connected");
        channels.push(StreamChannel::new(stream, format!("external at {}", peer_addr)));
    }

    Ok(channels)
}

/// Connect an external to the central, retrying while it is not yet listening
pub async fn connect_central(settings: &NetworkSettings) -> Result<TcpChannel> {
    let addr = settings.address();
    let mut backoff = ExponentialBackoff {
        initial_interval: settings.initial_retry_delay(),
        max_interval: settings.max_retry_delay(),
        max_elapsed_time: Some(settings.connect_timeout()),
        ..Default::default()
    };

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                let peer_addr = stream.peer_addr()?;
                configure(&stream, peer_addr);
                info!(addr = %peer_addr, attempt, "Connected to central");
                return Ok(StreamChannel::new(stream, format!("central at {}", peer_addr)));
            }
            Err(e) if is_retryable(e.kind()) => match backoff.next_backoff() {
                Some(delay) => {
                    debug!(addr = %addr, attempt, error = %e, ?delay, "Central not reachable yet, retrying");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(Error::ConnectionTimeout {
                        addr,
                        timeout_ms: settings.connect_timeout_ms,
                    });
                }
            },
            Err(e) => return Err(Error::connection_failed(addr, e.to_string())),
        }
    }
}

fn is_retryable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut
            | ErrorKind::NotConnected
            | ErrorKind::AddrNotAvailable
    )
}

/// Records are tiny and latency-bound
fn configure(stream: &TcpStream, peer_addr: SocketAddr) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!(peer_addr = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
    }
}
