use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use tokio::net::UdpSocket;

use super::datagram::{encode_block, BLOCK_LEN};

/// Owns one outbound UDP socket and a fixed IPv4 destination address.
pub struct UdpSender {
    socket: UdpSocket,
    dest_addr: Ipv4Addr,
}

impl UdpSender {
    pub async fn bind(dest_addr: Ipv4Addr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        Ok(Self { socket, dest_addr })
    }

    /// Queues a send of `samples` to (dest_addr, port). Completion is ignored;
    /// callers pass an owned block so it outlives the in-flight send even if
    /// this call races with another destined for a different port.
    pub fn async_send(self: &Arc<Self>, samples: [f32; BLOCK_LEN], port: u16) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let buf = encode_block(&samples);
            let dest = SocketAddrV4::new(this.dest_addr, port);
            let _ = this.socket.send_to(&buf, dest).await;
        });
    }
}
