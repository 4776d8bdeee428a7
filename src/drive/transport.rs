// UDP command sender
//
// Each command is one datagram. No acknowledgement, no retry: the rover
// simply acts on whatever arrives.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::messages::Command;

/// Error types for the command transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Datagram truncated: sent {sent} of {expected} bytes")]
    Truncated { sent: usize, expected: usize },
}

/// Fire-and-forget sender bound to one rover address
///
/// Sending takes `&self`, so a single sender can be shared between tasks.
/// Every datagram is handed to the kernel in one call, so concurrent sends
/// never mix bytes within a payload.
#[derive(Debug)]
pub struct UdpSender {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl UdpSender {
    /// Open an ephemeral local socket for sending to `dest`
    pub async fn bind(dest: SocketAddr) -> Result<Self, TransportError> {
        let local = match dest {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        let socket = UdpSocket::bind(local).await?;
        info!("Sending commands to {} from {}", dest, socket.local_addr()?);
        Ok(Self { socket, dest })
    }

    pub fn dest(&self) -> SocketAddr {
        self.dest
    }

    /// Encode and send one command
    pub async fn send(&self, command: &Command) -> Result<(), TransportError> {
        let payload = command.to_string();
        debug!("Sending: {}", payload);

        let sent = self.socket.send_to(payload.as_bytes(), self.dest).await?;
        if sent != payload.len() {
            return Err(TransportError::Truncated {
                sent,
                expected: payload.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{MotorSpeed, SteeringAngles};
    use std::time::Duration;
    use tokio::time::timeout;

    async fn receiver() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    async fn recv_string(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 128];
        let (len, _) = timeout(Duration::from_secs(1), socket.recv_from(&mut buf))
            .await
            .expect("no datagram received")
            .unwrap();
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_sends_one_datagram_per_command() {
        let (rx, addr) = receiver().await;
        let sender = UdpSender::bind(addr).await.unwrap();
        assert_eq!(sender.dest(), addr);

        sender
            .send(&Command::from(MotorSpeed::new(-128)))
            .await
            .unwrap();
        sender
            .send(&Command::from(SteeringAngles::NEUTRAL))
            .await
            .unwrap();

        assert_eq!(recv_string(&rx).await, "M,-128");
        assert_eq!(recv_string(&rx).await, "S,90,90,90,90,90,90");
    }

    #[tokio::test]
    async fn test_concurrent_sends_stay_whole() {
        let (rx, addr) = receiver().await;
        let sender = std::sync::Arc::new(UdpSender::bind(addr).await.unwrap());

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..20 {
            let sender = sender.clone();
            tasks.spawn(async move {
                let cmd = if i % 2 == 0 {
                    Command::from(MotorSpeed::new(i))
                } else {
                    Command::from(SteeringAngles::new([100.0, 80.0, 90.0, 90.0, 80.0, 100.0]))
                };
                sender.send(&cmd).await.unwrap();
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }

        for _ in 0..20 {
            let payload = recv_string(&rx).await;
            let parsed: Result<Command, _> = payload.parse();
            assert!(parsed.is_ok(), "corrupted datagram: {:?}", payload);
        }
    }
}
