// Bench receiver: decodes rover commands the way the firmware does
//
// Handy for checking the controller side without a rover on the network.

use std::future::Future;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{info, warn};

use crate::messages::{Command, ParseError};

/// Firmware receive buffer is 128 bytes including the terminator
pub const MAX_DATAGRAM: usize = 127;

#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenStats {
    pub received: u64,
    pub parsed: u64,
    pub rejected: u64,
}

/// Decode one datagram payload
pub fn decode_datagram(payload: &[u8]) -> Result<Command, ParseError> {
    let payload = &payload[..payload.len().min(MAX_DATAGRAM)];
    String::from_utf8_lossy(payload).parse()
}

/// Receive and log commands on `socket` until `shutdown` resolves
pub async fn serve<S>(
    socket: &UdpSocket,
    json: bool,
    shutdown: S,
) -> Result<ListenStats, ListenError>
where
    S: Future<Output = ()>,
{
    let mut stats = ListenStats::default();
    let mut buf = [0u8; MAX_DATAGRAM];
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = socket.recv_from(&mut buf) => {
                let (len, from) = received?;
                stats.received += 1;

                match decode_datagram(&buf[..len]) {
                    Ok(cmd) if json => {
                        stats.parsed += 1;
                        info!("{}", serde_json::to_string(&cmd)?);
                    }
                    Ok(cmd) => {
                        stats.parsed += 1;
                        info!("{} -> {:?}", from, cmd);
                    }
                    Err(e) => {
                        stats.rejected += 1;
                        warn!("{} sent a bad command: {}", from, e);
                    }
                }
            }
        }
    }

    Ok(stats)
}

/// Bind `addr` and listen until Ctrl-C
pub async fn run(addr: SocketAddr, json: bool) -> Result<ListenStats, ListenError> {
    let socket = UdpSocket::bind(addr).await?;
    info!("Listening for rover commands on {}", socket.local_addr()?);

    let stats = serve(&socket, json, async {
        // Treat a failed signal handler as an immediate stop
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    info!(
        "Listener stopped: {} received, {} parsed, {} rejected",
        stats.received, stats.parsed, stats.rejected
    );
    Ok(stats)
}
