use std::os::fd::AsFd;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use ipcpkt_packet::PacketType;
use ipcpkt_transport::{AnonymousPipe, NamedPipe, PacketTransport, SocketTransport, TransportConfig};

use crate::exit::{io_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a single packet.
    Send(SendArgs),
    /// Listen and print received packets.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Transports reachable from the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Named duplex pipe; TARGET is the pipe name or a socket path.
    NamedPipe,
    /// TCP; TARGET is IPV4:PORT.
    Socket,
    /// Anonymous pipe on stdin/stdout; no TARGET.
    Stdio,
}

#[derive(Args, Debug)]
pub struct EndpointArgs {
    /// Pipe name, socket path, or IPV4:PORT (omit for stdio).
    pub target: Option<String>,
    /// Transport to use.
    #[arg(long, short = 't', value_enum, default_value = "named-pipe")]
    pub transport: TransportKind,
    /// Directory for named-pipe sockets (default: system temp dir).
    #[arg(long, value_name = "DIR")]
    pub runtime_dir: Option<PathBuf>,
    /// Per-packet read/write timeout (e.g. 5s, 500ms). Default: block.
    #[arg(long)]
    pub timeout: Option<String>,
}

impl EndpointArgs {
    pub fn config(&self) -> CliResult<TransportConfig> {
        let timeout = self.timeout.as_deref().map(parse_duration).transpose()?;
        Ok(TransportConfig {
            read_timeout: timeout,
            write_timeout: timeout,
            runtime_dir: self.runtime_dir.clone(),
            ..TransportConfig::default()
        })
    }

    pub fn target(&self) -> CliResult<&str> {
        self.target.as_deref().ok_or_else(|| {
            CliError::new(
                USAGE,
                format!("a TARGET is required for the {:?} transport", self.transport),
            )
        })
    }

    /// Attach to the endpoint in the client role.
    pub fn open_client(&self) -> CliResult<Box<dyn PacketTransport>> {
        let config = self.config()?;
        let transport: Box<dyn PacketTransport> = match self.transport {
            TransportKind::NamedPipe => Box::new(
                NamedPipe::open_with_config(self.target()?, config)
                    .map_err(|err| transport_error("connect failed", err))?,
            ),
            TransportKind::Socket => {
                let (ip, port) = parse_socket_target(self.target()?)?;
                Box::new(
                    SocketTransport::connect_with_config(&ip, port, config)
                        .map_err(|err| transport_error("connect failed", err))?,
                )
            }
            TransportKind::Stdio => Box::new(stdio_pipe(true, true, config)?),
        };
        Ok(transport)
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
    /// Packet type (unknown, message, data, command).
    #[arg(long = "type", default_value = "data")]
    pub packet_type: PacketType,
    /// Sequence number carried in the header.
    #[arg(long, default_value = "0")]
    pub seq: u32,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for one reply packet and print it.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
    /// Only print packets of these types (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub types: Option<Vec<PacketType>>,
    /// Exit after receiving N packets.
    #[arg(long)]
    pub count: Option<usize>,
    /// Send every received packet back to its sender.
    #[arg(long)]
    pub echo: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Wrap this process's stdin and/or stdout as an anonymous pipe.
pub fn stdio_pipe(read: bool, write: bool, config: TransportConfig) -> CliResult<AnonymousPipe> {
    let read_end = if read {
        Some(
            std::io::stdin()
                .as_fd()
                .try_clone_to_owned()
                .map_err(|err| io_error("stdin unavailable", err))?,
        )
    } else {
        None
    };
    let write_end = if write {
        Some(
            std::io::stdout()
                .as_fd()
                .try_clone_to_owned()
                .map_err(|err| io_error("stdout unavailable", err))?,
        )
    } else {
        None
    };
    AnonymousPipe::from_fds_with_config(read_end, write_end, config)
        .map_err(|err| transport_error("stdio pipe failed", err))
}

pub fn parse_socket_target(target: &str) -> CliResult<(String, u16)> {
    let (ip, port) = target
        .rsplit_once(':')
        .ok_or_else(|| CliError::new(USAGE, format!("expected IPV4:PORT, got {target}")))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| CliError::new(USAGE, format!("invalid port: {port}")))?;
    Ok((ip.to_string(), port))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn socket_target_splits_on_last_colon() {
        assert_eq!(
            parse_socket_target("127.0.0.1:9000").unwrap(),
            ("127.0.0.1".to_string(), 9000)
        );
        assert_eq!(parse_socket_target("127.0.0.1").unwrap_err().code, USAGE);
        assert_eq!(parse_socket_target("127.0.0.1:99999").unwrap_err().code, USAGE);
    }
}
