use ipcpkt_packet::Packet;

use crate::error::Result;
use crate::handle::HandleState;

/// The capability set every packet transport offers once it is open.
///
/// Creation and connection differ per transport and live on the concrete
/// types; moving packets and releasing resources look the same everywhere.
pub trait PacketTransport {
    /// Send one packet (blocking).
    ///
    /// The header length must equal the payload length.
    fn write_packet(&mut self, packet: &Packet) -> Result<()>;

    /// Receive one packet (blocking).
    fn read_packet(&mut self) -> Result<Packet>;

    /// Release the underlying OS resources. Safe to call any number of times.
    fn close(&mut self);

    /// Current lifecycle state.
    fn state(&self) -> HandleState;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;

    /// Whether the handle currently owns live resources.
    fn is_open(&self) -> bool {
        self.state() == HandleState::Open
    }
}

impl<T: PacketTransport + ?Sized> PacketTransport for Box<T> {
    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        (**self).write_packet(packet)
    }

    fn read_packet(&mut self) -> Result<Packet> {
        (**self).read_packet()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn state(&self) -> HandleState {
        (**self).state()
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}
