//! Wire-level datagram codec and the two independent UDP I/O loops.

pub mod datagram;
pub mod receiver;
pub mod sender;

pub use datagram::Datagram;
pub use receiver::UdpReceiver;
pub use sender::UdpSender;
