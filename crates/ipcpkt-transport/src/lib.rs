//! Packet transports over local and network OS resources.
//!
//! Four interchangeable ways to move [`Packet`](ipcpkt_packet::Packet)s
//! between two endpoints:
//! - [`NamedPipe`]: named duplex channel (Unix domain socket on Unix)
//! - [`AnonymousPipe`]: unidirectional, inheritable pipe pair
//! - [`SharedMemory`]: fixed-capacity named memory region
//! - [`SocketTransport`]: TCP over IPv4
//!
//! Each handle owns its OS resources exclusively, releases them on
//! [`close`](PacketTransport::close) or drop, and moves packets with the
//! shared [`PacketTransport`] contract. Every call blocks the calling thread.

pub mod config;
pub mod error;
pub mod framing;
pub mod handle;
pub mod traits;

#[cfg(unix)]
pub mod anonymous_pipe;
#[cfg(unix)]
pub mod named_pipe;
#[cfg(unix)]
pub mod shm;
pub mod socket;

pub use config::TransportConfig;
pub use error::{ErrorKind, PipeEnd, Result, TransferPhase, TransportError};
pub use handle::HandleState;
pub use traits::PacketTransport;

#[cfg(unix)]
pub use anonymous_pipe::AnonymousPipe;
#[cfg(unix)]
pub use named_pipe::NamedPipe;
#[cfg(unix)]
pub use shm::SharedMemory;
pub use socket::SocketTransport;
