use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use ipcpkt_packet::Packet;
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::framing;
use crate::handle::{HandleState, Slot};
use crate::traits::PacketTransport;

/// Named duplex packet channel.
///
/// On Unix the name resolves to a Unix domain stream socket path. The
/// server side [`create`](NamedPipe::create)s the name and
/// [`connect`](NamedPipe::connect)s one client at a time; clients
/// [`open`](NamedPipe::open) it by name. The socket file is removed on
/// close, but only if it is still the one this handle created.
pub struct NamedPipe {
    slot: Slot<PipeInner>,
    config: TransportConfig,
}

struct PipeInner {
    path: PathBuf,
    role: Role,
    stream: Option<UnixStream>,
}

enum Role {
    Server {
        listener: UnixListener,
        created_inode: (u64, u64),
    },
    Client,
}

impl NamedPipe {
    /// Default permission mode for created pipe paths.
    pub const DEFAULT_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Create the server side of a named pipe.
    ///
    /// If a stale socket exists at the resolved path it is removed first;
    /// any other kind of file there is left alone and creation fails.
    pub fn create(name: &str) -> Result<Self> {
        Self::create_with_config(name, TransportConfig::default())
    }

    /// Create the server side of a named pipe with explicit configuration.
    pub fn create_with_config(name: &str, config: TransportConfig) -> Result<Self> {
        let path = config.pipe_path(name)?;
        check_path_len(&path)?;

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale pipe socket");
                std::fs::remove_file(&path)
                    .map_err(|e| TransportError::create(path.display(), e))?;
            } else {
                return Err(TransportError::create(
                    path.display(),
                    std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                ));
            }
        }

        let listener =
            UnixListener::bind(&path).map_err(|e| TransportError::create(path.display(), e))?;

        let created = discard_on_error(&path, harden_bound_path(&path))?;

        info!(?path, "named pipe created");

        Ok(Self {
            slot: Slot::Open(PipeInner {
                path,
                role: Role::Server {
                    listener,
                    created_inode: (created.dev(), created.ino()),
                },
                stream: None,
            }),
            config,
        })
    }

    /// Open the client side of an existing named pipe (blocking).
    pub fn open(name: &str) -> Result<Self> {
        Self::open_with_config(name, TransportConfig::default())
    }

    /// Open the client side of an existing named pipe with explicit configuration.
    pub fn open_with_config(name: &str, config: TransportConfig) -> Result<Self> {
        let path = config.pipe_path(name)?;
        check_path_len(&path)?;

        let stream =
            UnixStream::connect(&path).map_err(|e| TransportError::connect(path.display(), e))?;
        apply_timeouts(&stream, &config).map_err(|e| TransportError::connect(path.display(), e))?;
        debug!(?path, "opened named pipe");

        Ok(Self {
            slot: Slot::Open(PipeInner {
                path,
                role: Role::Client,
                stream: Some(stream),
            }),
            config,
        })
    }

    /// Wait for a client to attach (server side, blocking).
    pub fn connect(&mut self) -> Result<()> {
        let inner = self.slot.get_mut()?;
        if inner.stream.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        let Role::Server { listener, .. } = &inner.role else {
            return Err(TransportError::AlreadyConnected);
        };

        let (stream, _addr) = listener.accept().map_err(TransportError::Accept)?;
        apply_timeouts(&stream, &self.config)
            .map_err(|e| TransportError::connect(inner.path.display(), e))?;
        debug!(path = ?inner.path, "client connected to named pipe");

        inner.stream = Some(stream);
        Ok(())
    }

    /// Drop the current client but keep the name bound (server side).
    ///
    /// A later [`connect`](NamedPipe::connect) accepts the next client.
    pub fn disconnect(&mut self) -> Result<()> {
        let inner = self.slot.get_mut()?;
        if !matches!(inner.role, Role::Server { .. }) {
            return Err(TransportError::NotConnected);
        }
        if let Some(stream) = inner.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            debug!(path = ?inner.path, "client disconnected from named pipe");
        }
        Ok(())
    }

    /// Whether a peer is currently attached.
    pub fn is_connected(&self) -> bool {
        self.slot
            .get()
            .map(|inner| inner.stream.is_some())
            .unwrap_or(false)
    }

    /// Whether this handle created the name.
    pub fn is_server(&self) -> bool {
        matches!(
            self.slot.get(),
            Ok(PipeInner {
                role: Role::Server { .. },
                ..
            })
        )
    }

    /// The socket path backing this pipe.
    pub fn path(&self) -> Option<&Path> {
        self.slot.get().ok().map(|inner| inner.path.as_path())
    }

    fn stream_mut(&mut self) -> Result<&mut UnixStream> {
        self.slot
            .get_mut()?
            .stream
            .as_mut()
            .ok_or(TransportError::NotConnected)
    }
}

impl PacketTransport for NamedPipe {
    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let max = self.config.max_payload_size;
        framing::write_packet(self.stream_mut()?, packet, max)
    }

    fn read_packet(&mut self) -> Result<Packet> {
        let max = self.config.max_payload_size;
        framing::read_packet(self.stream_mut()?, max)
    }

    fn close(&mut self) {
        let Some(inner) = self.slot.close() else {
            return;
        };
        if let Some(stream) = inner.stream {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        if let Role::Server {
            listener,
            created_inode: (expected_dev, expected_ino),
        } = inner.role
        {
            drop(listener);
            match std::fs::symlink_metadata(&inner.path) {
                Ok(metadata)
                    if metadata.file_type().is_socket()
                        && metadata.dev() == expected_dev
                        && metadata.ino() == expected_ino =>
                {
                    debug!(path = ?inner.path, "removing named pipe socket");
                    if let Err(err) = std::fs::remove_file(&inner.path) {
                        warn!(path = ?inner.path, %err, "failed to remove named pipe socket");
                    }
                }
                Ok(_) => {
                    debug!(path = ?inner.path, "pipe path identity changed; skipping cleanup");
                }
                Err(_) => {}
            }
        }
        debug!(path = ?inner.path, "named pipe closed");
    }

    fn state(&self) -> HandleState {
        self.slot.state()
    }

    fn transport_name(&self) -> &'static str {
        "named-pipe"
    }
}

impl Default for NamedPipe {
    fn default() -> Self {
        Self {
            slot: Slot::Unopened,
            config: TransportConfig::default(),
        }
    }
}

impl Drop for NamedPipe {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for NamedPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedPipe")
            .field("state", &self.state())
            .field("path", &self.path())
            .field("server", &self.is_server())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Restrict a freshly bound socket to its owner and record its identity.
fn harden_bound_path(path: &Path) -> std::io::Result<std::fs::Metadata> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(NamedPipe::DEFAULT_MODE))?;
    std::fs::symlink_metadata(path)
}

/// Remove a socket we just bound when finishing its setup failed.
fn discard_on_error<T>(path: &Path, result: std::io::Result<T>) -> Result<T> {
    result.map_err(|e| {
        if let Err(err) = std::fs::remove_file(path) {
            warn!(?path, %err, "failed to remove half-created named pipe socket");
        }
        TransportError::create(path.display(), e)
    })
}

fn check_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= NamedPipe::MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: NamedPipe::MAX_PATH_LEN,
        });
    }
    Ok(())
}

fn apply_timeouts(stream: &UnixStream, config: &TransportConfig) -> std::io::Result<()> {
    stream.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(config.write_timeout)
}
