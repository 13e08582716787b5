use std::path::PathBuf;
use std::time::Duration;

use ipcpkt_packet::DEFAULT_MAX_PAYLOAD;

use crate::error::{Result, TransportError};

/// Longest shared-memory name accepted (before the `/ipcpkt-` prefix).
pub const MAX_SHM_NAME_LEN: usize = 200;

const SHM_PREFIX: &str = "/ipcpkt-";
const PIPE_SUFFIX: &str = "pipe";

/// Configuration shared by the packet transports.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking stream reads.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking stream writes.
    pub write_timeout: Option<Duration>,
    /// Directory holding named-pipe socket files. Default: the system temp dir.
    pub runtime_dir: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
            runtime_dir: None,
        }
    }
}

impl TransportConfig {
    /// Resolve a named-pipe name to the socket path backing it.
    ///
    /// Names containing a `/` are taken as paths verbatim; bare names land
    /// in the runtime directory as `<name>.pipe`.
    pub fn pipe_path(&self, name: &str) -> Result<PathBuf> {
        validate_common(name)?;
        if name.contains('/') {
            return Ok(PathBuf::from(name));
        }
        let dir = self
            .runtime_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Ok(dir.join(format!("{name}.{PIPE_SUFFIX}")))
    }

    /// Resolve a shared-memory name to its POSIX object name.
    pub fn shm_name(&self, name: &str) -> Result<String> {
        validate_common(name)?;
        if name.contains('/') {
            return Err(TransportError::InvalidName {
                name: name.to_string(),
                reason: "shared memory names must not contain '/'",
            });
        }
        if name.len() > MAX_SHM_NAME_LEN {
            return Err(TransportError::InvalidName {
                name: name.to_string(),
                reason: "shared memory name too long",
            });
        }
        Ok(format!("{SHM_PREFIX}{name}"))
    }
}

fn validate_common(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TransportError::InvalidName {
            name: String::new(),
            reason: "name must not be empty",
        });
    }
    if name.contains('\0') {
        return Err(TransportError::InvalidName {
            name: name.replace('\0', "\\0"),
            reason: "name must not contain NUL",
        });
    }
    Ok(())
}
