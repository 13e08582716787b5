use std::fmt;
use std::io;

use ipcpkt_packet::PacketError;
use ipcpkt_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(&err, INTERNAL), format!("{context}: {err}"))
}

fn io_code(err: &io::Error, fallback: i32) -> i32 {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::InvalidInput => USAGE,
        _ => fallback,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Create { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Transfer { source, .. }
        | TransportError::Accept(source) => io_code(source, TRANSPORT_ERROR),
        TransportError::Packet(_)
        | TransportError::PayloadTooLarge { .. }
        | TransportError::CapacityExceeded { .. } => DATA_INVALID,
        TransportError::ConnectionClosed => FAILURE,
        TransportError::InvalidName { .. } | TransportError::PathTooLong { .. } => USAGE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn packet_error(context: &str, err: PacketError) -> CliError {
    let code = match err {
        PacketError::UnknownTypeName(_) => USAGE,
        _ => DATA_INVALID,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_map_to_timeout_code() {
        let err = TransportError::Transfer {
            phase: ipcpkt_transport::TransferPhase::Header,
            source: io::Error::from(io::ErrorKind::WouldBlock),
        };
        assert_eq!(transport_error("recv", err).code, TIMEOUT);
    }

    #[test]
    fn capacity_and_framing_problems_are_data_errors() {
        let err = TransportError::CapacityExceeded {
            required: 70,
            capacity: 64,
        };
        assert_eq!(transport_error("send", err).code, DATA_INVALID);
        let err = TransportError::Packet(PacketError::InvalidType(9));
        assert_eq!(transport_error("recv", err).code, DATA_INVALID);
    }

    #[test]
    fn missing_peer_is_plain_failure() {
        let err = TransportError::Connect {
            resource: "/tmp/nowhere.pipe".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let cli = transport_error("connect failed", err);
        assert_eq!(cli.code, FAILURE);
        assert!(cli.message.starts_with("connect failed: "));
    }
}
