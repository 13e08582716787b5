//! Packet framing over byte streams.
//!
//! Every stream transport reads the same way: the fixed header block first,
//! then exactly `length` payload bytes. Writers differ only in whether the
//! header and payload go out as two writes or one.

use std::io::{ErrorKind, Read, Write};

use bytes::{Bytes, BytesMut};
use ipcpkt_packet::{encode_packet, Packet, PacketHeader, HEADER_SIZE};
use tracing::trace;

use crate::error::{Result, TransportError};

/// Read one complete packet (blocking).
///
/// Returns `Err(TransportError::ConnectionClosed)` when EOF is reached
/// before the first header byte.
pub fn read_packet<R: Read>(inner: &mut R, max_payload: usize) -> Result<Packet> {
    let mut block = [0u8; HEADER_SIZE];
    read_header_block(inner, &mut block)?;
    let header = PacketHeader::decode(&block)?;

    if header.payload_len() > max_payload {
        return Err(TransportError::PayloadTooLarge {
            size: header.payload_len(),
            max: max_payload,
        });
    }

    let mut payload = vec![0u8; header.payload_len()];
    inner
        .read_exact(&mut payload)
        .map_err(TransportError::payload)?;

    trace!(
        packet_type = %header.packet_type,
        length = header.length,
        sequence_num = header.sequence_num,
        "read packet"
    );
    Ok(Packet::from_parts(header, Bytes::from(payload))?)
}

/// Write the header block, then the payload, as two ordered writes.
pub fn write_packet<W: Write>(inner: &mut W, packet: &Packet, max_payload: usize) -> Result<()> {
    check_outgoing(packet, max_payload)?;

    inner
        .write_all(&packet.header.to_bytes())
        .map_err(TransportError::header)?;
    inner
        .write_all(&packet.payload)
        .map_err(TransportError::payload)?;
    inner.flush().map_err(TransportError::payload)?;

    trace!(
        packet_type = %packet.header.packet_type,
        length = packet.header.length,
        sequence_num = packet.header.sequence_num,
        "wrote packet"
    );
    Ok(())
}

/// Encode header and payload into one buffer and send it with a single write.
pub fn write_packet_contiguous<W: Write>(
    inner: &mut W,
    packet: &Packet,
    max_payload: usize,
) -> Result<()> {
    check_outgoing(packet, max_payload)?;

    let mut buf = BytesMut::with_capacity(packet.wire_size());
    encode_packet(packet, &mut buf)?;
    inner.write_all(&buf).map_err(TransportError::header)?;
    inner.flush().map_err(TransportError::header)?;

    trace!(
        packet_type = %packet.header.packet_type,
        length = packet.header.length,
        sequence_num = packet.header.sequence_num,
        "wrote packet"
    );
    Ok(())
}

fn check_outgoing(packet: &Packet, max_payload: usize) -> Result<()> {
    packet.validate()?;
    if packet.payload.len() > max_payload {
        return Err(TransportError::PayloadTooLarge {
            size: packet.payload.len(),
            max: max_payload,
        });
    }
    Ok(())
}

fn read_header_block<R: Read>(inner: &mut R, block: &mut [u8; HEADER_SIZE]) -> Result<()> {
    let mut filled = 0usize;
    while filled < HEADER_SIZE {
        match inner.read(&mut block[filled..]) {
            Ok(0) if filled == 0 => return Err(TransportError::ConnectionClosed),
            Ok(0) => {
                return Err(TransportError::header(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("stream ended after {filled} of {HEADER_SIZE} header bytes"),
                )))
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::header(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ipcpkt_packet::{PacketType, DEFAULT_MAX_PAYLOAD};

    use super::*;
    use crate::error::TransferPhase;

    fn packet(kind: PacketType, seq: u32, payload: &'static [u8]) -> Packet {
        Packet::new(kind, seq, payload).unwrap()
    }

    #[test]
    fn two_phase_write_matches_contiguous_write() {
        let p = packet(PacketType::Data, 1, b"hello world");

        let mut split = Vec::new();
        write_packet(&mut split, &p, DEFAULT_MAX_PAYLOAD).unwrap();
        let mut joined = Vec::new();
        write_packet_contiguous(&mut joined, &p, DEFAULT_MAX_PAYLOAD).unwrap();

        assert_eq!(split, joined);
        assert_eq!(split.len(), HEADER_SIZE + 11);
    }

    #[test]
    fn reads_back_multiple_packets_in_order() {
        let mut wire = Vec::new();
        let first = packet(PacketType::Command, 1, b"one");
        let second = packet(PacketType::Message, 2, b"");
        let third = packet(PacketType::Data, 3, b"three");
        for p in [&first, &second, &third] {
            write_packet(&mut wire, p, DEFAULT_MAX_PAYLOAD).unwrap();
        }

        let mut cursor = Cursor::new(wire);
        assert_eq!(read_packet(&mut cursor, DEFAULT_MAX_PAYLOAD).unwrap(), first);
        let empty = read_packet(&mut cursor, DEFAULT_MAX_PAYLOAD).unwrap();
        assert_eq!(empty, second);
        assert!(empty.payload.is_empty());
        assert_eq!(read_packet(&mut cursor, DEFAULT_MAX_PAYLOAD).unwrap(), third);
        assert!(matches!(
            read_packet(&mut cursor, DEFAULT_MAX_PAYLOAD),
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[test]
    fn eof_mid_header_is_header_transfer_failure() {
        let mut cursor = Cursor::new(vec![2u8, 0, 0]);
        let err = read_packet(&mut cursor, DEFAULT_MAX_PAYLOAD).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Transfer {
                phase: TransferPhase::Header,
                ..
            }
        ));
    }

    #[test]
    fn eof_mid_payload_is_payload_transfer_failure() {
        let mut wire = Vec::new();
        write_packet(&mut wire, &packet(PacketType::Data, 0, b"abcdef"), DEFAULT_MAX_PAYLOAD)
            .unwrap();
        wire.truncate(HEADER_SIZE + 3);

        let err = read_packet(&mut Cursor::new(wire), DEFAULT_MAX_PAYLOAD).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Transfer {
                phase: TransferPhase::Payload,
                ..
            }
        ));
    }

    #[test]
    fn oversized_declared_length_is_rejected_before_allocation() {
        let header = PacketHeader {
            packet_type: PacketType::Data,
            length: u32::MAX,
            sequence_num: 0,
        };
        let err = read_packet(&mut Cursor::new(header.to_bytes().to_vec()), 1024).unwrap_err();
        assert!(matches!(err, TransportError::PayloadTooLarge { max: 1024, .. }));
    }

    #[test]
    fn write_rejects_mismatched_header_without_writing() {
        let mut p = packet(PacketType::Data, 0, b"abc");
        p.header.length = 99;
        let mut wire = Vec::new();
        let err = write_packet(&mut wire, &p, DEFAULT_MAX_PAYLOAD).unwrap_err();
        assert!(matches!(err, TransportError::Packet(_)));
        assert!(wire.is_empty());
    }

    #[test]
    fn write_rejects_payload_over_limit() {
        let p = packet(PacketType::Data, 0, b"0123456789");
        let mut wire = Vec::new();
        let err = write_packet_contiguous(&mut wire, &p, 4).unwrap_err();
        assert!(matches!(err, TransportError::PayloadTooLarge { size: 10, max: 4 }));
        assert!(wire.is_empty());
    }

    #[test]
    fn byte_at_a_time_reader_reassembles_packet() {
        let mut wire = Vec::new();
        let p = packet(PacketType::Command, 7, b"run");
        write_packet(&mut wire, &p, DEFAULT_MAX_PAYLOAD).unwrap();

        let mut reader = ByteByByte { bytes: wire, pos: 0 };
        assert_eq!(read_packet(&mut reader, DEFAULT_MAX_PAYLOAD).unwrap(), p);
    }

    struct ByteByByte {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByte {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }
}
