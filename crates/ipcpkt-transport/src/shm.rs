use std::ffi::{CStr, CString};
use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr::NonNull;

use bytes::Bytes;
use ipcpkt_packet::{Packet, PacketHeader, HEADER_SIZE};
use tracing::{debug, info, trace, warn};

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::handle::{HandleState, Slot};
use crate::traits::PacketTransport;

/// Fixed-capacity shared-memory region holding one packet at a time.
///
/// The owner [`create`](SharedMemory::create)s a named POSIX shared-memory
/// object; peers [`open`](SharedMemory::open) it by name and learn its size
/// from the OS. A write places the header at offset 0 followed by the
/// payload; a read copies them back out.
///
/// There is no synchronization between writers and readers, in this
/// process or any other. Callers must serialize access to the region.
pub struct SharedMemory {
    slot: Slot<Mapping>,
    config: TransportConfig,
}

struct Mapping {
    file: File,
    ptr: NonNull<u8>,
    capacity: usize,
    os_name: CString,
    owner: bool,
}

// SAFETY: the mapping is exclusively owned by this handle and all access goes
// through `&mut self` or copies out of the region; no thread-affine state.
unsafe impl Send for Mapping {}

impl SharedMemory {
    /// Create and map a new named region of `capacity` bytes.
    ///
    /// Fails if a region with the same name already exists.
    pub fn create(name: &str, capacity: usize) -> Result<Self> {
        Self::create_with_config(name, capacity, TransportConfig::default())
    }

    /// Create and map a new named region with explicit configuration.
    pub fn create_with_config(name: &str, capacity: usize, config: TransportConfig) -> Result<Self> {
        let os_name = os_name(&config, name)?;
        if capacity == 0 {
            return Err(TransportError::create(
                name,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "capacity must be greater than 0",
                ),
            ));
        }

        let file = shm_open(&os_name, libc::O_CREAT | libc::O_EXCL | libc::O_RDWR)
            .map_err(|e| TransportError::create(name, e))?;

        let mapped = file
            .set_len(capacity as u64)
            .and_then(|()| map(&file, capacity));
        let ptr = match mapped {
            Ok(ptr) => ptr,
            Err(err) => {
                unlink(&os_name);
                return Err(TransportError::create(name, err));
            }
        };

        info!(name, capacity, "shared memory created");
        Ok(Self {
            slot: Slot::Open(Mapping {
                file,
                ptr,
                capacity,
                os_name,
                owner: true,
            }),
            config,
        })
    }

    /// Map an existing named region, sized as the OS reports it.
    pub fn open(name: &str) -> Result<Self> {
        Self::open_with_config(name, TransportConfig::default())
    }

    /// Map an existing named region with explicit configuration.
    pub fn open_with_config(name: &str, config: TransportConfig) -> Result<Self> {
        let os_name = os_name(&config, name)?;
        let file = shm_open(&os_name, libc::O_RDWR).map_err(|e| TransportError::create(name, e))?;

        let capacity = file
            .metadata()
            .map_err(|e| TransportError::create(name, e))?
            .len() as usize;
        if capacity == 0 {
            return Err(TransportError::create(
                name,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "region has zero size"),
            ));
        }
        let ptr = map(&file, capacity).map_err(|e| TransportError::create(name, e))?;

        debug!(name, capacity, "shared memory opened");
        Ok(Self {
            slot: Slot::Open(Mapping {
                file,
                ptr,
                capacity,
                os_name,
                owner: false,
            }),
            config,
        })
    }

    /// Mapped size in bytes; 0 when not open.
    pub fn capacity(&self) -> usize {
        self.slot.get().map(|m| m.capacity).unwrap_or(0)
    }

    /// Whether this handle created (and will unlink) the region.
    pub fn is_owner(&self) -> bool {
        self.slot.get().map(|m| m.owner).unwrap_or(false)
    }

    /// The OS-level object name backing this region.
    pub fn os_name(&self) -> Option<&str> {
        self.slot.get().ok().and_then(|m| m.os_name.to_str().ok())
    }

    /// Copy the whole region out, for inspection.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let mapping = self.slot.get()?;
        let mut out = vec![0u8; mapping.capacity];
        // SAFETY: the mapping is `capacity` bytes long and `out` has the same length.
        unsafe {
            std::ptr::copy_nonoverlapping(mapping.ptr.as_ptr(), out.as_mut_ptr(), mapping.capacity)
        };
        Ok(out)
    }
}

impl PacketTransport for SharedMemory {
    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let mapping = self.slot.get_mut()?;
        packet.validate()?;
        if packet.payload.len() > self.config.max_payload_size {
            return Err(TransportError::PayloadTooLarge {
                size: packet.payload.len(),
                max: self.config.max_payload_size,
            });
        }

        let required = HEADER_SIZE + packet.payload.len();
        if required > mapping.capacity {
            return Err(TransportError::CapacityExceeded {
                required,
                capacity: mapping.capacity,
            });
        }

        let header = packet.header.to_bytes();
        let base = mapping.ptr.as_ptr();
        // SAFETY: `required <= capacity`, so both copies stay inside the mapping,
        // and the source buffers are distinct heap/stack memory.
        unsafe {
            std::ptr::copy_nonoverlapping(header.as_ptr(), base, HEADER_SIZE);
            std::ptr::copy_nonoverlapping(
                packet.payload.as_ptr(),
                base.add(HEADER_SIZE),
                packet.payload.len(),
            );
        }

        trace!(
            packet_type = %packet.header.packet_type,
            length = packet.header.length,
            sequence_num = packet.header.sequence_num,
            "wrote packet to shared memory"
        );
        Ok(())
    }

    fn read_packet(&mut self) -> Result<Packet> {
        let mapping = self.slot.get()?;
        if mapping.capacity < HEADER_SIZE {
            return Err(TransportError::CapacityExceeded {
                required: HEADER_SIZE,
                capacity: mapping.capacity,
            });
        }

        let base = mapping.ptr.as_ptr();
        let mut block = [0u8; HEADER_SIZE];
        // SAFETY: the mapping holds at least HEADER_SIZE bytes.
        unsafe { std::ptr::copy_nonoverlapping(base, block.as_mut_ptr(), HEADER_SIZE) };
        let header = PacketHeader::decode(&block)?;

        let required = HEADER_SIZE + header.payload_len();
        if required > mapping.capacity {
            return Err(TransportError::CapacityExceeded {
                required,
                capacity: mapping.capacity,
            });
        }
        if header.payload_len() > self.config.max_payload_size {
            return Err(TransportError::PayloadTooLarge {
                size: header.payload_len(),
                max: self.config.max_payload_size,
            });
        }

        let mut payload = vec![0u8; header.payload_len()];
        // SAFETY: `required <= capacity`, so the payload range is inside the mapping.
        unsafe {
            std::ptr::copy_nonoverlapping(base.add(HEADER_SIZE), payload.as_mut_ptr(), payload.len())
        };

        trace!(
            packet_type = %header.packet_type,
            length = header.length,
            sequence_num = header.sequence_num,
            "read packet from shared memory"
        );
        Ok(Packet::from_parts(header, Bytes::from(payload))?)
    }

    fn close(&mut self) {
        let Some(mapping) = self.slot.close() else {
            return;
        };
        // SAFETY: `ptr`/`capacity` describe a live mapping created by `map` and
        // the slot has just given up its only reference to it.
        let rc = unsafe { libc::munmap(mapping.ptr.as_ptr().cast(), mapping.capacity) };
        if rc != 0 {
            warn!(
                err = %std::io::Error::last_os_error(),
                "failed to unmap shared memory"
            );
        }
        drop(mapping.file);
        if mapping.owner {
            unlink(&mapping.os_name);
        }
        debug!(name = ?mapping.os_name, owner = mapping.owner, "shared memory closed");
    }

    fn state(&self) -> HandleState {
        self.slot.state()
    }

    fn transport_name(&self) -> &'static str {
        "shared-memory"
    }
}

impl Default for SharedMemory {
    fn default() -> Self {
        Self {
            slot: Slot::Unopened,
            config: TransportConfig::default(),
        }
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemory")
            .field("state", &self.state())
            .field("name", &self.os_name())
            .field("capacity", &self.capacity())
            .field("owner", &self.is_owner())
            .finish()
    }
}

fn os_name(config: &TransportConfig, name: &str) -> Result<CString> {
    let resolved = config.shm_name(name)?;
    CString::new(resolved).map_err(|_| TransportError::InvalidName {
        name: name.to_string(),
        reason: "name must not contain NUL",
    })
}

fn shm_open(name: &CStr, flags: libc::c_int) -> std::io::Result<File> {
    // SAFETY: `name` is a valid NUL-terminated string for the duration of the call.
    let fd = unsafe { libc::shm_open(name.as_ptr(), flags | libc::O_CLOEXEC, 0o600 as libc::c_uint) };
    if fd < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: shm_open returned a fresh descriptor that nothing else owns.
    Ok(File::from(unsafe { OwnedFd::from_raw_fd(fd) }))
}

fn map(file: &File, capacity: usize) -> std::io::Result<NonNull<u8>> {
    // SAFETY: mapping a shared-memory descriptor we own; the kernel validates
    // the length against the object and we check for MAP_FAILED.
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            capacity,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            file.as_raw_fd(),
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(std::io::Error::last_os_error());
    }
    NonNull::new(ptr.cast::<u8>())
        .ok_or_else(|| std::io::Error::other("mmap returned null"))
}

fn unlink(name: &CStr) {
    // SAFETY: `name` is a valid NUL-terminated string for the duration of the call.
    if unsafe { libc::shm_unlink(name.as_ptr()) } != 0 {
        warn!(
            ?name,
            err = %std::io::Error::last_os_error(),
            "failed to unlink shared memory"
        );
    }
}
