//! TCP echo: one server thread echoes packets back to a client.
//!
//! Run with:
//!   cargo run --example socket-echo
//!
//! To talk to a long-running listener instead:
//!   cargo run --features cli -- listen 127.0.0.1:7070 -t socket --echo
//!   cargo run --features cli -- send 127.0.0.1:7070 -t socket --type command --data run --wait

use std::thread;

use ipcpkt::transport::SocketTransport;
use ipcpkt::{Packet, PacketTransport, PacketType, TransportError};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = SocketTransport::bind("127.0.0.1", 0)?;
    let addr = listener.local_addr()?;
    eprintln!("Listening on {addr}");

    let server = thread::spawn(move || -> Result<usize, TransportError> {
        let mut conn = listener.accept()?;
        let mut echoed = 0;
        loop {
            match conn.read_packet() {
                Ok(packet) => {
                    conn.write_packet(&packet)?;
                    echoed += 1;
                }
                Err(TransportError::ConnectionClosed) => return Ok(echoed),
                Err(e) => return Err(e),
            }
        }
    });

    let mut client = SocketTransport::connect("127.0.0.1", addr.port())?;
    let outgoing = [
        Packet::new(PacketType::Message, 1, &b"hello"[..])?,
        Packet::new(PacketType::Command, 2, &b"status"[..])?,
        Packet::new(PacketType::Data, 3, vec![7u8; 1024])?,
    ];
    for packet in &outgoing {
        client.write_packet(packet)?;
        let reply = client.read_packet()?;
        eprintln!(
            "[client] {} seq={} length={}",
            reply.header.packet_type, reply.header.sequence_num, reply.header.length
        );
        assert_eq!(&reply, packet);
    }
    client.close();

    let echoed = server.join().map_err(|_| "server thread panicked")??;
    eprintln!("[server] echoed {echoed} packets");
    Ok(())
}
