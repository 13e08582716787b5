//! Packet model shared by every ipcpkt transport.
//!
//! A packet is a fixed 12-byte header followed by exactly `length` payload
//! bytes:
//! - a 4-byte little-endian type tag
//! - a 4-byte little-endian payload length
//! - a 4-byte little-endian caller-supplied sequence number
//!
//! Transports move packets; they never interpret the type tag or the
//! sequence number.

pub mod codec;
pub mod error;
pub mod kind;

pub use codec::{
    decode_packet, encode_packet, Packet, PacketHeader, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{PacketError, Result};
pub use kind::PacketType;
