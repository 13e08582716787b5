use std::fmt;
use std::path::PathBuf;

use ipcpkt_packet::PacketError;

/// Which half of a packet was in flight when a transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Header,
    Payload,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferPhase::Header => f.write_str("header"),
            TransferPhase::Payload => f.write_str("payload"),
        }
    }
}

/// One end of an anonymous pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeEnd {
    Read,
    Write,
}

impl fmt::Display for PipeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeEnd::Read => f.write_str("read"),
            PipeEnd::Write => f.write_str("write"),
        }
    }
}

/// Coarse failure classes shared by every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Create/Open/Bind could not allocate or attach to the OS resource.
    ResourceCreationFailed,
    /// Connect/Accept could not establish a peer relationship.
    ConnectionFailed,
    /// A read or write could not move the requested bytes.
    TransferFailed,
    /// A write would not fit in a fixed-size resource.
    CapacityExceeded,
}

/// Errors that can occur in packet transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create or attach to the named resource.
    #[error("failed to create {resource}: {source}")]
    Create {
        resource: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified resource.
    #[error("failed to connect to {resource}: {source}")]
    Connect {
        resource: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// A server-side handle already has a connected client.
    #[error("a client is already connected")]
    AlreadyConnected,

    /// Moving header or payload bytes failed.
    #[error("{phase} transfer failed: {source}")]
    Transfer {
        phase: TransferPhase,
        source: std::io::Error,
    },

    /// The peer closed the channel at a packet boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// The packet itself is malformed.
    #[error("invalid packet: {0}")]
    Packet(#[from] PacketError),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The record does not fit in the mapped region.
    #[error("capacity exceeded ({required} bytes required, capacity {capacity})")]
    CapacityExceeded { required: usize, capacity: usize },

    /// The handle has not been opened or has been closed.
    #[error("transport is not open")]
    NotOpen,

    /// The handle is open but has no peer to exchange packets with.
    #[error("transport is not connected")]
    NotConnected,

    /// The requested pipe end has been released.
    #[error("{0} end of pipe is closed")]
    EndClosed(PipeEnd),

    /// The resource name is not usable.
    #[error("invalid resource name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

impl TransportError {
    /// The failure class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Create { .. }
            | TransportError::InvalidName { .. }
            | TransportError::PathTooLong { .. } => ErrorKind::ResourceCreationFailed,
            TransportError::Connect { .. }
            | TransportError::Accept(_)
            | TransportError::AlreadyConnected => ErrorKind::ConnectionFailed,
            TransportError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            TransportError::Transfer { .. }
            | TransportError::ConnectionClosed
            | TransportError::Packet(_)
            | TransportError::PayloadTooLarge { .. }
            | TransportError::NotOpen
            | TransportError::NotConnected
            | TransportError::EndClosed(_) => ErrorKind::TransferFailed,
        }
    }

    /// The underlying OS error, if any.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            TransportError::Create { source, .. }
            | TransportError::Connect { source, .. }
            | TransportError::Transfer { source, .. }
            | TransportError::Accept(source) => Some(source),
            _ => None,
        }
    }

    pub(crate) fn create(resource: impl fmt::Display, source: std::io::Error) -> Self {
        TransportError::Create {
            resource: resource.to_string(),
            source,
        }
    }

    pub(crate) fn connect(resource: impl fmt::Display, source: std::io::Error) -> Self {
        TransportError::Connect {
            resource: resource.to_string(),
            source,
        }
    }

    pub(crate) fn header(source: std::io::Error) -> Self {
        TransportError::Transfer {
            phase: TransferPhase::Header,
            source,
        }
    }

    pub(crate) fn payload(source: std::io::Error) -> Self {
        TransportError::Transfer {
            phase: TransferPhase::Payload,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let io = || std::io::Error::other("boom");
        assert_eq!(
            TransportError::create("x", io()).kind(),
            ErrorKind::ResourceCreationFailed
        );
        assert_eq!(
            TransportError::connect("x", io()).kind(),
            ErrorKind::ConnectionFailed
        );
        assert_eq!(
            TransportError::payload(io()).kind(),
            ErrorKind::TransferFailed
        );
        assert_eq!(
            TransportError::CapacityExceeded {
                required: 70,
                capacity: 64
            }
            .kind(),
            ErrorKind::CapacityExceeded
        );
    }

    #[test]
    fn transfer_error_names_phase() {
        let err = TransportError::header(std::io::Error::other("eof"));
        assert_eq!(err.to_string(), "header transfer failed: eof");
        assert!(err.io_source().is_some());
    }
}
