/// Errors that can occur while building, validating or decoding packets.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// The header carries a type tag outside the known set.
    #[error("invalid packet type tag {0}")]
    InvalidType(u32),

    /// The header length disagrees with the payload actually attached.
    #[error("header length {declared} does not match payload length {actual}")]
    LengthMismatch { declared: u32, actual: usize },

    /// The payload exceeds the allowed maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A packet type name could not be parsed.
    #[error("unknown packet type name: {0}")]
    UnknownTypeName(String),
}

pub type Result<T> = std::result::Result<T, PacketError>;
