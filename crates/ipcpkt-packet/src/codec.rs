use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{PacketError, Result};
use crate::kind::PacketType;

/// Packet header: type (4) + length (4) + sequence number (4) = 12 bytes.
pub const HEADER_SIZE: usize = 12;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Fixed-size record preceding every payload on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    /// Application-level tag.
    pub packet_type: PacketType,
    /// Number of payload bytes that follow the header.
    pub length: u32,
    /// Caller-supplied correlation token, passed through untouched.
    pub sequence_num: u32,
}

impl PacketHeader {
    /// Append the wire form of this header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u32_le(self.packet_type.as_u32());
        dst.put_u32_le(self.length);
        dst.put_u32_le(self.sequence_num);
    }

    /// The wire form of this header as a fixed block.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut block = [0u8; HEADER_SIZE];
        block[0..4].copy_from_slice(&self.packet_type.as_u32().to_le_bytes());
        block[4..8].copy_from_slice(&self.length.to_le_bytes());
        block[8..12].copy_from_slice(&self.sequence_num.to_le_bytes());
        block
    }

    /// Decode a header from its fixed wire block.
    pub fn decode(block: &[u8; HEADER_SIZE]) -> Result<Self> {
        let mut src = &block[..];
        let tag = src.get_u32_le();
        let length = src.get_u32_le();
        let sequence_num = src.get_u32_le();
        Ok(Self {
            packet_type: PacketType::try_from(tag)?,
            length,
            sequence_num,
        })
    }

    /// Payload length as a `usize`.
    pub fn payload_len(&self) -> usize {
        self.length as usize
    }
}

/// One message unit: a header plus an owned payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Bytes,
}

impl Packet {
    /// Build a packet whose header length matches `payload`.
    pub fn new(
        packet_type: PacketType,
        sequence_num: u32,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let payload = payload.into();
        let length = u32::try_from(payload.len()).map_err(|_| PacketError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        })?;
        Ok(Self {
            header: PacketHeader {
                packet_type,
                length,
                sequence_num,
            },
            payload,
        })
    }

    /// Assemble a packet from a decoded header and the payload read after it.
    pub fn from_parts(header: PacketHeader, payload: Bytes) -> Result<Self> {
        let packet = Self { header, payload };
        packet.validate()?;
        Ok(packet)
    }

    /// Check that the header length equals the payload length.
    pub fn validate(&self) -> Result<()> {
        if self.header.payload_len() != self.payload.len() {
            return Err(PacketError::LengthMismatch {
                declared: self.header.length,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    pub fn packet_type(&self) -> PacketType {
        self.header.packet_type
    }

    pub fn sequence_num(&self) -> u32 {
        self.header.sequence_num
    }

    /// The total wire size of this packet (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a packet into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬────────────┬──────────────┬─────────────────┐
/// │ Type (4B)  │ Length     │ Sequence     │ Payload         │
/// │ LE tag     │ (4B LE)    │ (4B LE)      │ (Length bytes)  │
/// └────────────┴────────────┴──────────────┴─────────────────┘
/// ```
pub fn encode_packet(packet: &Packet, dst: &mut BytesMut) -> Result<()> {
    packet.validate()?;
    dst.reserve(packet.wire_size());
    packet.header.encode(dst);
    dst.put_slice(&packet.payload);
    Ok(())
}

/// Decode a packet from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete packet yet.
/// On success, consumes the packet bytes from the buffer.
pub fn decode_packet(src: &mut BytesMut, max_payload: usize) -> Result<Option<Packet>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let mut block = [0u8; HEADER_SIZE];
    block.copy_from_slice(&src[..HEADER_SIZE]);
    let header = PacketHeader::decode(&block)?;

    if header.payload_len() > max_payload {
        return Err(PacketError::PayloadTooLarge {
            size: header.payload_len(),
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + header.payload_len();
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(header.payload_len()).freeze();

    Ok(Some(Packet { header, payload }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout_is_little_endian() {
        let header = PacketHeader {
            packet_type: PacketType::Command,
            length: 0x0102_0304,
            sequence_num: 7,
        };
        assert_eq!(
            header.to_bytes(),
            [3, 0, 0, 0, 0x04, 0x03, 0x02, 0x01, 7, 0, 0, 0]
        );

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.as_ref(), header.to_bytes().as_slice());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let packet = Packet::new(PacketType::Data, 1, &b"hello world"[..]).unwrap();
        let mut buf = BytesMut::new();
        encode_packet(&packet, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 11);

        let decoded = decode_packet(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(decoded, packet);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_new_sets_length_from_payload() {
        let packet = Packet::new(PacketType::Message, 9, vec![0u8; 300]).unwrap();
        assert_eq!(packet.header.length, 300);
        assert_eq!(packet.sequence_num(), 9);
        assert_eq!(packet.wire_size(), HEADER_SIZE + 300);
    }

    #[test]
    fn test_encode_rejects_length_mismatch() {
        let mut packet = Packet::new(PacketType::Data, 0, &b"abc"[..]).unwrap();
        packet.header.length = 10;

        let mut buf = BytesMut::new();
        let err = encode_packet(&packet, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            PacketError::LengthMismatch {
                declared: 10,
                actual: 3
            }
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[2u8, 0, 0, 0, 5][..]);
        assert!(decode_packet(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let packet = Packet::new(PacketType::Data, 0, &b"hello"[..]).unwrap();
        let mut buf = BytesMut::new();
        encode_packet(&packet, &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        assert!(decode_packet(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn test_decode_invalid_type() {
        let mut buf = BytesMut::from(&[9u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0][..]);
        let result = decode_packet(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(PacketError::InvalidType(9))));
    }

    #[test]
    fn test_decode_payload_too_large() {
        let header = PacketHeader {
            packet_type: PacketType::Data,
            length: 1024,
            sequence_num: 0,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);

        let result = decode_packet(&mut buf, 16);
        assert!(matches!(
            result,
            Err(PacketError::PayloadTooLarge { size: 1024, max: 16 })
        ));
    }

    #[test]
    fn test_empty_payload() {
        let packet = Packet::new(PacketType::Unknown, 0, Bytes::new()).unwrap();
        let mut buf = BytesMut::new();
        encode_packet(&packet, &mut buf).unwrap();

        let decoded = decode_packet(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(decoded.header.length, 0);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_multiple_packets() {
        let mut buf = BytesMut::new();
        let first = Packet::new(PacketType::Command, 1, &b"first"[..]).unwrap();
        let second = Packet::new(PacketType::Data, 2, &b"second"[..]).unwrap();
        encode_packet(&first, &mut buf).unwrap();
        encode_packet(&second, &mut buf).unwrap();

        assert_eq!(decode_packet(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap(), first);
        assert_eq!(decode_packet(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap(), second);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_from_parts_validates() {
        let header = PacketHeader {
            packet_type: PacketType::Data,
            length: 4,
            sequence_num: 0,
        };
        assert!(Packet::from_parts(header, Bytes::from_static(b"abcd")).is_ok());
        assert!(Packet::from_parts(header, Bytes::from_static(b"ab")).is_err());
    }
}
