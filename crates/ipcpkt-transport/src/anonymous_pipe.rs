use std::fs::File;
use std::os::fd::{AsFd, BorrowedFd, FromRawFd, OwnedFd};

use ipcpkt_packet::Packet;
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::{PipeEnd, Result, TransportError};
use crate::framing;
use crate::handle::{HandleState, Slot};
use crate::traits::PacketTransport;

/// Unidirectional pipe pair carrying packets from the write end to the read end.
///
/// Both ends are created inheritable so a child process can be handed one
/// of them. Writes always go to the write end and reads always come from
/// the read end; two-way traffic needs two pipes.
pub struct AnonymousPipe {
    slot: Slot<PipeEnds>,
    config: TransportConfig,
}

struct PipeEnds {
    read: Option<File>,
    write: Option<File>,
}

impl AnonymousPipe {
    /// Allocate a connected read/write pair.
    pub fn create() -> Result<Self> {
        Self::create_with_config(TransportConfig::default())
    }

    /// Allocate a connected read/write pair with explicit configuration.
    pub fn create_with_config(config: TransportConfig) -> Result<Self> {
        let mut fds = [-1 as libc::c_int; 2];
        // SAFETY: `fds` is a valid, writable array of two descriptors as required by pipe(2).
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(TransportError::create(
                "anonymous pipe",
                std::io::Error::last_os_error(),
            ));
        }
        // SAFETY: pipe(2) succeeded, so both descriptors are open and owned solely by us.
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        debug!(read_fd = fds[0], write_fd = fds[1], "anonymous pipe created");
        Ok(Self {
            slot: Slot::Open(PipeEnds {
                read: Some(File::from(read)),
                write: Some(File::from(write)),
            }),
            config,
        })
    }

    /// Adopt pipe ends obtained elsewhere, e.g. inherited from a parent or
    /// taken from stdio.
    pub fn from_fds(read: Option<OwnedFd>, write: Option<OwnedFd>) -> Result<Self> {
        Self::from_fds_with_config(read, write, TransportConfig::default())
    }

    /// Adopt pipe ends with explicit configuration.
    pub fn from_fds_with_config(
        read: Option<OwnedFd>,
        write: Option<OwnedFd>,
        config: TransportConfig,
    ) -> Result<Self> {
        if read.is_none() && write.is_none() {
            return Err(TransportError::create(
                "anonymous pipe",
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no pipe ends supplied"),
            ));
        }
        Ok(Self {
            slot: Slot::Open(PipeEnds {
                read: read.map(File::from),
                write: write.map(File::from),
            }),
            config,
        })
    }

    /// Borrow the read end, for handing to a child process.
    pub fn read_fd(&self) -> Option<BorrowedFd<'_>> {
        self.slot.get().ok()?.read.as_ref().map(AsFd::as_fd)
    }

    /// Borrow the write end, for handing to a child process.
    pub fn write_fd(&self) -> Option<BorrowedFd<'_>> {
        self.slot.get().ok()?.write.as_ref().map(AsFd::as_fd)
    }

    /// Detach the read end, leaving this handle write-only.
    pub fn take_read_end(&mut self) -> Option<OwnedFd> {
        self.slot.get_mut().ok()?.read.take().map(OwnedFd::from)
    }

    /// Detach the write end, leaving this handle read-only.
    pub fn take_write_end(&mut self) -> Option<OwnedFd> {
        self.slot.get_mut().ok()?.write.take().map(OwnedFd::from)
    }

    /// Release the read end only.
    pub fn close_read_end(&mut self) {
        if let Some(fd) = self.take_read_end() {
            drop(fd);
            debug!("anonymous pipe read end closed");
        }
    }

    /// Release the write end only, signalling EOF to the reader.
    pub fn close_write_end(&mut self) {
        if let Some(fd) = self.take_write_end() {
            drop(fd);
            debug!("anonymous pipe write end closed");
        }
    }
}

impl PacketTransport for AnonymousPipe {
    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let max = self.config.max_payload_size;
        let end = self
            .slot
            .get_mut()?
            .write
            .as_mut()
            .ok_or(TransportError::EndClosed(PipeEnd::Write))?;
        framing::write_packet(end, packet, max)
    }

    fn read_packet(&mut self) -> Result<Packet> {
        let max = self.config.max_payload_size;
        let end = self
            .slot
            .get_mut()?
            .read
            .as_mut()
            .ok_or(TransportError::EndClosed(PipeEnd::Read))?;
        framing::read_packet(end, max)
    }

    fn close(&mut self) {
        if let Some(ends) = self.slot.close() {
            drop(ends);
            debug!("anonymous pipe closed");
        }
    }

    fn state(&self) -> HandleState {
        self.slot.state()
    }

    fn transport_name(&self) -> &'static str {
        "anonymous-pipe"
    }
}

impl Default for AnonymousPipe {
    fn default() -> Self {
        Self {
            slot: Slot::Unopened,
            config: TransportConfig::default(),
        }
    }
}

impl Drop for AnonymousPipe {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for AnonymousPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnonymousPipe")
            .field("state", &self.state())
            .field("read", &self.read_fd().is_some())
            .field("write", &self.write_fd().is_some())
            .finish()
    }
}
