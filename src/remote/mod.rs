//! Remote memory API: the debuggee side of the engine.
//!
//! `RemoteMemory` is the narrow interface the view engine consumes. Every
//! operation may fail (unmapped memory, protection faults, the target dying)
//! and reports it as a typed `RemoteError`; nothing here retries.
//!
//! Backends:
//! - `image::MemoryImage`, in-process regions (offline snapshots, tests)
//! - `procfs::ProcessMemory`, a live Linux process via `/proc/<pid>/mem`

pub mod expr;
pub mod image;
#[cfg(target_os = "linux")]
pub mod procfs;

use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a remote memory backend.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("memory at {address:#x} is not accessible")]
    Inaccessible { address: u64 },

    #[error("protection fault writing {address:#x}")]
    Protection { address: u64 },

    #[error("target process is gone")]
    ProcessGone,

    /// The remote acknowledged the request but reported failure.
    #[error("remote rejected the request: {0}")]
    Rejected(String),

    #[error("pointer expression error: {0}")]
    Expression(String),

    #[error("operation not supported by this target: {0}")]
    Unsupported(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operations the engine needs from a debuggee.
pub trait RemoteMemory {
    /// Read up to `length` bytes at `address`.
    ///
    /// A backend may return fewer bytes when readable memory ends inside the
    /// request; it must fail rather than return an empty buffer.
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, RemoteError>;

    /// Write `bytes` at `address`; `Ok` only once the target acknowledged it.
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<(), RemoteError>;

    /// Pointer width of the target in bytes.
    fn pointer_size(&self) -> usize {
        8
    }

    /// Read a little-endian pointer at `address`.
    fn read_pointer(&self, address: u64) -> Result<u64, RemoteError> {
        let size = self.pointer_size().min(8);
        let raw = self.read_bytes(address, size)?;
        if raw.len() < size {
            return Err(RemoteError::Inaccessible {
                address: address + raw.len() as u64,
            });
        }
        let mut buf = [0u8; 8];
        buf[..size].copy_from_slice(&raw[..size]);
        Ok(u64::from_le_bytes(buf))
    }

    /// Write a string as UTF-8 bytes. Terminator handling is up to the target;
    /// the default writes exactly the string's bytes.
    fn write_utf8(&self, address: u64, text: &str) -> Result<(), RemoteError> {
        self.write_bytes(address, text.as_bytes())
    }

    /// Resolve a user-entered pointer expression to an address.
    fn evaluate_pointer_expression(&self, text: &str) -> Result<u64, RemoteError> {
        expr::evaluate(text).map_err(|e| RemoteError::Expression(e.to_string()))
    }

    /// Install a native hook at `address`.
    fn hook_native(&self, _address: u64) -> Result<(), RemoteError> {
        Err(RemoteError::Unsupported("native hooks"))
    }
}

impl<T: RemoteMemory + ?Sized> RemoteMemory for Arc<T> {
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, RemoteError> {
        (**self).read_bytes(address, length)
    }
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<(), RemoteError> {
        (**self).write_bytes(address, bytes)
    }
    fn pointer_size(&self) -> usize {
        (**self).pointer_size()
    }
    fn read_pointer(&self, address: u64) -> Result<u64, RemoteError> {
        (**self).read_pointer(address)
    }
    fn write_utf8(&self, address: u64, text: &str) -> Result<(), RemoteError> {
        (**self).write_utf8(address, text)
    }
    fn evaluate_pointer_expression(&self, text: &str) -> Result<u64, RemoteError> {
        (**self).evaluate_pointer_expression(text)
    }
    fn hook_native(&self, address: u64) -> Result<(), RemoteError> {
        (**self).hook_native(address)
    }
}

impl<T: RemoteMemory + ?Sized> RemoteMemory for &T {
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, RemoteError> {
        (**self).read_bytes(address, length)
    }
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<(), RemoteError> {
        (**self).write_bytes(address, bytes)
    }
    fn pointer_size(&self) -> usize {
        (**self).pointer_size()
    }
    fn read_pointer(&self, address: u64) -> Result<u64, RemoteError> {
        (**self).read_pointer(address)
    }
    fn write_utf8(&self, address: u64, text: &str) -> Result<(), RemoteError> {
        (**self).write_utf8(address, text)
    }
    fn evaluate_pointer_expression(&self, text: &str) -> Result<u64, RemoteError> {
        (**self).evaluate_pointer_expression(text)
    }
    fn hook_native(&self, address: u64) -> Result<(), RemoteError> {
        (**self).hook_native(address)
    }
}
