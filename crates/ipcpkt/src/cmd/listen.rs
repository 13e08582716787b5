use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ipcpkt_packet::Packet;
use ipcpkt_transport::{NamedPipe, PacketTransport, SocketTransport, TransportError};

use crate::cmd::{parse_socket_target, stdio_pipe, ListenArgs, TransportKind};
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_packet, OutputFormat};

/// What to do after a peer's session ends.
#[derive(Debug, PartialEq, Eq)]
enum Session {
    /// The peer went away; wait for the next one.
    PeerGone,
    /// Enough packets seen or shutdown requested.
    Done,
}

struct Listener<'a> {
    args: &'a ListenArgs,
    format: OutputFormat,
    running: Arc<AtomicBool>,
    printed: usize,
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let config = args.endpoint.config()?;
    let mut listener = Listener {
        args: &args,
        format,
        running,
        printed: 0,
    };

    match args.endpoint.transport {
        TransportKind::NamedPipe => {
            let mut pipe = NamedPipe::create_with_config(args.endpoint.target()?, config)
                .map_err(|err| transport_error("create failed", err))?;
            while listener.is_running() {
                pipe.connect()
                    .map_err(|err| transport_error("connect failed", err))?;
                let session = listener.serve(&mut pipe)?;
                pipe.disconnect()
                    .map_err(|err| transport_error("disconnect failed", err))?;
                if session == Session::Done {
                    break;
                }
            }
            pipe.close();
        }
        TransportKind::Socket => {
            let (ip, port) = parse_socket_target(args.endpoint.target()?)?;
            let server = SocketTransport::bind_with_config(&ip, port, config)
                .map_err(|err| transport_error("bind failed", err))?;
            while listener.is_running() {
                let mut conn = server
                    .accept()
                    .map_err(|err| transport_error("accept failed", err))?;
                if listener.serve(&mut conn)? == Session::Done {
                    break;
                }
            }
        }
        TransportKind::Stdio => {
            if args.echo {
                return Err(CliError::new(
                    USAGE,
                    "--echo is not available on stdio; stdout carries the listing",
                ));
            }
            let mut pipe = stdio_pipe(true, false, config)?;
            listener.serve(&mut pipe)?;
        }
    }

    Ok(SUCCESS)
}

impl Listener<'_> {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn serve<T: PacketTransport>(&mut self, transport: &mut T) -> CliResult<Session> {
        while self.is_running() {
            let packet = match transport.read_packet() {
                Ok(packet) => packet,
                Err(TransportError::ConnectionClosed) => return Ok(Session::PeerGone),
                Err(err) => return Err(transport_error("receive failed", err)),
            };

            if self.args.echo {
                transport
                    .write_packet(&packet)
                    .map_err(|err| transport_error("echo failed", err))?;
            }

            if !self.wanted(&packet) {
                continue;
            }

            print_packet(&packet, transport.transport_name(), self.format);
            self.printed = self.printed.saturating_add(1);

            if let Some(count) = self.args.count {
                if self.printed >= count {
                    return Ok(Session::Done);
                }
            }
        }
        Ok(Session::Done)
    }

    fn wanted(&self, packet: &Packet) -> bool {
        match &self.args.types {
            Some(types) => types.contains(&packet.header.packet_type),
            None => true,
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}
