//! TCP liveness probe
//!
//! One bounded connection attempt per call. The connection is closed as soon as
//! it is established; no data is exchanged and nothing is retried here.

use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no connection to {target} within {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    #[error("connect to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

/// `host:port`, with IPv6 literals bracketed.
pub fn target(address: &str, port: u16) -> String {
    if address.contains(':') && !address.starts_with('[') {
        format!("[{}]:{}", address, port)
    } else {
        format!("{}:{}", address, port)
    }
}

/// Connect to `address:port`, name resolution included in `limit`.
///
/// Returns how long the handshake took.
pub async fn probe(address: &str, port: u16, limit: Duration) -> Result<Duration, ProbeError> {
    let started = Instant::now();
    let host = address.trim_start_matches('[').trim_end_matches(']');

    match timeout(limit, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            let elapsed = started.elapsed();
            debug!("Connected to {} in {:?}", target(address, port), elapsed);
            Ok(elapsed)
        }
        Ok(Err(source)) => Err(ProbeError::Connect {
            target: target(address, port),
            source,
        }),
        Err(_) => Err(ProbeError::Timeout {
            target: target(address, port),
            timeout: limit,
        }),
    }
}
