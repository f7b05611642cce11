//! Live Linux process memory through `/proc/<pid>/mem`.
//!
//! Positioned reads and writes on the mem file go through the kernel's
//! access checks (ptrace mode), so the caller needs the same rights a
//! debugger would. Unmapped pages surface as `EIO`, which ends a read early.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use tracing::{debug, trace, warn};

use super::{RemoteError, RemoteMemory};

const EIO: i32 = 5;
const EFAULT: i32 = 14;

/// Memory of a running process, addressed by virtual address.
#[derive(Debug)]
pub struct ProcessMemory {
    pid: u32,
    file: File,
    writable: bool,
    pointer_size: usize,
}

impl ProcessMemory {
    /// Open the memory of `pid` for reading and, when permitted, writing.
    pub fn open(pid: u32) -> Result<Self, RemoteError> {
        let path = PathBuf::from(format!("/proc/{}/mem", pid));
        let (file, writable) = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(f) => (f, true),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                warn!(pid, "mem not writable, falling back to read-only");
                (File::open(&path).map_err(map_open_error)?, false)
            }
            Err(e) => return Err(map_open_error(e)),
        };
        debug!(pid, writable, "Opened process memory");
        Ok(Self {
            pid,
            file,
            writable,
            pointer_size: std::mem::size_of::<usize>(),
        })
    }

    /// Override the pointer width, e.g. for a 32-bit target on a 64-bit host.
    pub fn with_pointer_size(mut self, pointer_size: usize) -> Self {
        self.pointer_size = pointer_size;
        self
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

fn map_open_error(e: io::Error) -> RemoteError {
    if e.kind() == io::ErrorKind::NotFound {
        RemoteError::ProcessGone
    } else {
        RemoteError::Io(e)
    }
}

impl RemoteMemory for ProcessMemory {
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, RemoteError> {
        let mut buf = vec![0u8; length];
        let mut filled = 0usize;
        while filled < length {
            match self
                .file
                .read_at(&mut buf[filled..], address + filled as u64)
            {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // EIO: the next page is unmapped
                Err(e) if filled > 0 => {
                    trace!(error = %e, filled, "short read from process memory");
                    break;
                }
                Err(e) => {
                    trace!(error = %e, "process memory read failed");
                    return Err(match e.raw_os_error() {
                        Some(EIO) | Some(EFAULT) => RemoteError::Inaccessible { address },
                        _ => RemoteError::Io(e),
                    });
                }
            }
        }
        if filled == 0 && length > 0 {
            return Err(RemoteError::Inaccessible { address });
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<(), RemoteError> {
        if !self.writable {
            return Err(RemoteError::Protection { address });
        }
        self.file
            .write_all_at(bytes, address)
            .map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => RemoteError::Protection { address },
                _ => RemoteError::Inaccessible { address },
            })
    }

    fn pointer_size(&self) -> usize {
        self.pointer_size
    }
}
