use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{info, warn};

/// Check whether a TCP connection to `host:port` can be established within `timeout`.
///
/// Validates only network-layer reachability of the server, never the stream
/// path behind it. Refused connections, DNS failures and timeouts all yield `false`.
/// The socket is closed as soon as it is opened.
pub async fn probe_tcp(host: &str, port: u16, timeout: Duration) -> bool {
    let result = tokio::time::timeout(timeout, TcpStream::connect((host, port))).await;

    match result {
        Ok(Ok(stream)) => {
            info!(host = %host, port, "Connected to stream server");
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            warn!(host = %host, port, error = %e, "Stream server unreachable");
            false
        }
        Err(_) => {
            warn!(host = %host, port, timeout = ?timeout, "Timed out connecting to stream server");
            false
        }
    }
}
