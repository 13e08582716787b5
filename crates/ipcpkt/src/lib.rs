//! Typed packet exchange over interchangeable transports.
//!
//! ipcpkt moves discrete, length-delimited packets across a named pipe, an
//! anonymous pipe pair, a shared-memory region or a TCP socket, with the
//! same framing and the same lifecycle on each.
//!
//! # Crate Structure
//!
//! - [`packet`]: Packet model and header codec
//! - [`transport`]: The four transports and their shared contract

/// Re-export packet types.
pub mod packet {
    pub use ipcpkt_packet::*;
}

/// Re-export transport types.
pub mod transport {
    pub use ipcpkt_transport::*;
}

pub use ipcpkt_packet::{Packet, PacketHeader, PacketType};
pub use ipcpkt_transport::{PacketTransport, TransportConfig, TransportError};
