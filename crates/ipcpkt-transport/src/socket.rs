use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};

use ipcpkt_packet::Packet;
use tracing::{debug, info};

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::framing;
use crate::handle::{HandleState, Slot};
use crate::traits::PacketTransport;

/// TCP packet transport.
///
/// Framing is symmetric with every other transport: the writer sends the
/// full 12-byte header and the payload in one contiguous buffer, and the
/// reader receives the full header block before the payload. Peers that
/// expect a bare 4-byte total-length prefix are not wire compatible.
pub struct SocketTransport {
    slot: Slot<SocketInner>,
    config: TransportConfig,
}

enum SocketInner {
    Listener(TcpListener),
    Stream(TcpStream),
}

impl SocketTransport {
    /// Bind to an IPv4 address and port and start listening.
    ///
    /// Port 0 picks an ephemeral port; see [`local_addr`](Self::local_addr).
    pub fn bind(ip: &str, port: u16) -> Result<Self> {
        Self::bind_with_config(ip, port, TransportConfig::default())
    }

    /// Bind and listen with explicit configuration.
    pub fn bind_with_config(ip: &str, port: u16, config: TransportConfig) -> Result<Self> {
        let addr = parse_ipv4(ip, port)?;
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::create(addr, e))?;
        let local = listener.local_addr().ok();
        info!(?local, "socket listening");

        Ok(Self {
            slot: Slot::Open(SocketInner::Listener(listener)),
            config,
        })
    }

    /// Connect to a listening peer (blocking).
    pub fn connect(ip: &str, port: u16) -> Result<Self> {
        Self::connect_with_config(ip, port, TransportConfig::default())
    }

    /// Connect to a listening peer with explicit configuration.
    pub fn connect_with_config(ip: &str, port: u16, config: TransportConfig) -> Result<Self> {
        let addr = parse_ipv4(ip, port)?;
        let stream = TcpStream::connect(addr).map_err(|e| TransportError::connect(addr, e))?;
        prepare_stream(&stream, &config).map_err(|e| TransportError::connect(addr, e))?;
        debug!(%addr, "socket connected");

        Ok(Self {
            slot: Slot::Open(SocketInner::Stream(stream)),
            config,
        })
    }

    /// Accept the next incoming connection (blocking).
    ///
    /// The returned handle is bound to that peer; this listener stays
    /// usable for further accepts.
    pub fn accept(&self) -> Result<SocketTransport> {
        let SocketInner::Listener(listener) = self.slot.get()? else {
            return Err(TransportError::Accept(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "socket is not listening",
            )));
        };

        let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
        prepare_stream(&stream, &self.config).map_err(|e| TransportError::connect(peer, e))?;
        debug!(%peer, "accepted socket connection");

        Ok(SocketTransport {
            slot: Slot::Open(SocketInner::Stream(stream)),
            config: self.config.clone(),
        })
    }

    /// The locally bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        let addr = match self.slot.get()? {
            SocketInner::Listener(listener) => listener.local_addr(),
            SocketInner::Stream(stream) => stream.local_addr(),
        };
        addr.map_err(|e| address_error("local", e))
    }

    /// The connected peer's address.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        match self.slot.get()? {
            SocketInner::Listener(_) => Err(TransportError::NotConnected),
            SocketInner::Stream(stream) => {
                stream.peer_addr().map_err(|e| address_error("peer", e))
            }
        }
    }

    /// Whether this handle is a listener rather than a connection.
    pub fn is_listener(&self) -> bool {
        matches!(self.slot.get(), Ok(SocketInner::Listener(_)))
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        match self.slot.get_mut()? {
            SocketInner::Stream(stream) => Ok(stream),
            SocketInner::Listener(_) => Err(TransportError::NotConnected),
        }
    }
}

impl PacketTransport for SocketTransport {
    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let max = self.config.max_payload_size;
        framing::write_packet_contiguous(self.stream_mut()?, packet, max)
    }

    fn read_packet(&mut self) -> Result<Packet> {
        let max = self.config.max_payload_size;
        framing::read_packet(self.stream_mut()?, max)
    }

    fn close(&mut self) {
        match self.slot.close() {
            Some(SocketInner::Stream(stream)) => {
                let _ = stream.shutdown(Shutdown::Both);
                debug!("socket connection closed");
            }
            Some(SocketInner::Listener(_)) => debug!("socket listener closed"),
            None => {}
        }
    }

    fn state(&self) -> HandleState {
        self.slot.state()
    }

    fn transport_name(&self) -> &'static str {
        "tcp-socket"
    }
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self {
            slot: Slot::Unopened,
            config: TransportConfig::default(),
        }
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketTransport")
            .field("state", &self.state())
            .field("listener", &self.is_listener())
            .field("local", &self.local_addr().ok())
            .finish()
    }
}

fn parse_ipv4(ip: &str, port: u16) -> Result<SocketAddrV4> {
    let addr: Ipv4Addr = ip.trim().parse().map_err(|_| {
        TransportError::create(
            format!("{ip}:{port}"),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid IPv4 address"),
        )
    })?;
    Ok(SocketAddrV4::new(addr, port))
}

fn address_error(which: &str, source: std::io::Error) -> TransportError {
    TransportError::connect(format!("{which} socket address"), source)
}

fn prepare_stream(stream: &TcpStream, config: &TransportConfig) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    stream.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(config.write_timeout)
}
