//! Packet type tags.
//!
//! The tag is an application-level hint for payload interpretation. It is
//! carried verbatim; nothing below the application looks at it.

use std::fmt;
use std::str::FromStr;

use crate::error::PacketError;

/// Application-level packet classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum PacketType {
    #[default]
    Unknown = 0,
    Message = 1,
    Data = 2,
    Command = 3,
}

impl PacketType {
    /// Every defined tag, in wire order.
    pub const ALL: [PacketType; 4] = [
        PacketType::Unknown,
        PacketType::Message,
        PacketType::Data,
        PacketType::Command,
    ];

    /// The wire tag for this type.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Human-readable label for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            PacketType::Unknown => "UNKNOWN",
            PacketType::Message => "MESSAGE",
            PacketType::Data => "DATA",
            PacketType::Command => "COMMAND",
        }
    }
}

impl TryFrom<u32> for PacketType {
    type Error = PacketError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(PacketType::Unknown),
            1 => Ok(PacketType::Message),
            2 => Ok(PacketType::Data),
            3 => Ok(PacketType::Command),
            other => Err(PacketError::InvalidType(other)),
        }
    }
}

impl From<PacketType> for u32 {
    fn from(kind: PacketType) -> Self {
        kind.as_u32()
    }
}

impl FromStr for PacketType {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PacketType::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PacketError::UnknownTypeName(s.to_string()))
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_follow_declaration_order() {
        assert_eq!(PacketType::Unknown.as_u32(), 0);
        assert_eq!(PacketType::Message.as_u32(), 1);
        assert_eq!(PacketType::Data.as_u32(), 2);
        assert_eq!(PacketType::Command.as_u32(), 3);
    }

    #[test]
    fn rejects_undefined_tag() {
        let err = PacketType::try_from(4).unwrap_err();
        assert!(matches!(err, PacketError::InvalidType(4)));
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("data".parse::<PacketType>().unwrap(), PacketType::Data);
        assert_eq!(" Command ".parse::<PacketType>().unwrap(), PacketType::Command);
        assert!("bogus".parse::<PacketType>().is_err());
    }
}
