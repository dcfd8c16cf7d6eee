//! Connection table, loss concealment, and the packet-processing pipeline
//! that ties decoding, filtering, and dispatch together per source.

pub mod concealment;
pub mod connection;
pub mod packet_engine;

pub use concealment::ConcealmentPolicy;
pub use connection::ConnectionState;
pub use packet_engine::{EngineConfig, PacketEngine, PipelineFactory};
