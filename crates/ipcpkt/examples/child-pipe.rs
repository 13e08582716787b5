//! Anonymous pipes to a child process; the child acknowledges each packet.
//!
//! Run with:
//!   cargo run --example child-pipe
//!
//! The example re-executes itself with `child` as the first argument; the
//! child speaks packets on its stdin/stdout.

use std::os::fd::AsFd;
use std::process::{Command, Stdio};

use ipcpkt::transport::AnonymousPipe;
use ipcpkt::{Packet, PacketTransport, PacketType, TransportError};

const QUIT: &[u8] = b"quit";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::args().nth(1).as_deref() == Some("child") {
        return run_child();
    }

    let mut to_child = AnonymousPipe::create()?;
    let mut from_child = AnonymousPipe::create()?;
    let child_stdin = to_child.take_read_end().ok_or("read end already taken")?;
    let child_stdout = from_child.take_write_end().ok_or("write end already taken")?;

    let mut child = Command::new(std::env::current_exe()?)
        .arg("child")
        .stdin(Stdio::from(child_stdin))
        .stdout(Stdio::from(child_stdout))
        .spawn()?;

    for (seq, text) in ["alpha", "beta", "gamma"].iter().enumerate() {
        let packet = Packet::new(PacketType::Data, seq as u32, text.as_bytes().to_vec())?;
        to_child.write_packet(&packet)?;
        let ack = from_child.read_packet()?;
        eprintln!(
            "[parent] {} seq={} payload={}",
            ack.header.packet_type,
            ack.header.sequence_num,
            String::from_utf8_lossy(&ack.payload)
        );
    }

    // Pipe ends are inherited, so the child may still hold a copy of the
    // write end; ask it to stop rather than waiting for EOF.
    to_child.write_packet(&Packet::new(PacketType::Command, u32::MAX, QUIT)?)?;
    to_child.close();
    from_child.close();

    let status = child.wait()?;
    eprintln!("[parent] child exited with {status}");
    Ok(())
}

fn run_child() -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin().as_fd().try_clone_to_owned()?;
    let stdout = std::io::stdout().as_fd().try_clone_to_owned()?;
    let mut pipe = AnonymousPipe::from_fds(Some(stdin), Some(stdout))?;

    loop {
        let packet = match pipe.read_packet() {
            Ok(packet) => packet,
            Err(TransportError::ConnectionClosed) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.header.packet_type == PacketType::Command && packet.payload == QUIT {
            break;
        }
        let ack = format!("ack {} bytes", packet.payload.len());
        pipe.write_packet(&Packet::new(
            PacketType::Message,
            packet.header.sequence_num,
            ack.into_bytes(),
        )?)?;
    }
    Ok(())
}
