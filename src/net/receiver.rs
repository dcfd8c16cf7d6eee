use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use super::datagram::{Datagram, INBOUND_LEN};
use crate::engine::PacketEngine;
use crate::shutdown::ShutdownToken;

/// Owns the inbound UDP socket; posts each well-formed datagram to the
/// worker pool as a `PacketEngine::handle_packet` task, then re-arms.
pub struct UdpReceiver {
    socket: UdpSocket,
}

impl UdpReceiver {
    pub async fn bind(port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        Ok(Self { socket })
    }

    /// Drives the receive loop until `shutdown` is cancelled. Cancellation
    /// terminates the loop without re-arming; every other outcome re-arms.
    pub async fn run(self, engine: Arc<PacketEngine>, mut shutdown: ShutdownToken) {
        let mut buf = [0u8; INBOUND_LEN];
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("udp receiver stopping");
                    return;
                }
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((n, src)) if n == INBOUND_LEN => {
                            if let Some(datagram) = Datagram::decode(&buf[..n]) {
                                let engine = Arc::clone(&engine);
                                tokio::spawn(async move {
                                    engine.handle_packet(datagram, src).await;
                                });
                            }
                        }
                        Ok(n) => {
                            debug!(bytes = n, "dropped short or oversized datagram");
                        }
                        Err(err) => {
                            warn!("udp receive error: {err}");
                        }
                    }
                }
            }
        }
    }
}
