use std::fs;

use ipcpkt_packet::Packet;
use ipcpkt_transport::PacketTransport;

use crate::cmd::{SendArgs, TransportKind};
use crate::exit::{io_error, packet_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    check_args(&args)?;
    let payload = resolve_payload(&args)?;
    let packet = Packet::new(args.packet_type, args.seq, payload)
        .map_err(|err| packet_error("invalid packet", err))?;

    let mut transport = args.endpoint.open_client()?;
    let result = exchange(transport.as_mut(), &packet, args.wait);
    transport.close();

    if let Some(reply) = result? {
        print_packet(&reply, transport.transport_name(), format);
    }
    Ok(SUCCESS)
}

fn check_args(args: &SendArgs) -> CliResult<()> {
    if args.wait && args.endpoint.transport == TransportKind::Stdio {
        return Err(CliError::new(
            USAGE,
            "--wait is not available on stdio; stdout carries the outgoing packet",
        ));
    }
    Ok(())
}

fn exchange(
    transport: &mut dyn PacketTransport,
    packet: &Packet,
    wait: bool,
) -> CliResult<Option<Packet>> {
    transport
        .write_packet(packet)
        .map_err(|err| transport_error("send failed", err))?;
    tracing::debug!(
        packet_type = %packet.header.packet_type,
        length = packet.header.length,
        sequence_num = packet.header.sequence_num,
        transport = transport.transport_name(),
        "packet sent"
    );

    if !wait {
        return Ok(None);
    }
    transport
        .read_packet()
        .map(Some)
        .map_err(|err| transport_error("receive failed", err))
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}
