//! In-process remote target built from byte regions.
//!
//! `MemoryImage` stands in for a debuggee when the memory is already local:
//! a core-dump region, a saved snapshot, or a test fixture. Regions can be
//! read-only, the "process" can be marked dead, and native hook requests are
//! recorded instead of installed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use super::{RemoteError, RemoteMemory};

#[derive(Debug, Clone)]
struct Region {
    base: u64,
    bytes: Vec<u8>,
    writable: bool,
}

impl Region {
    fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }

    fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }
}

/// A set of non-overlapping memory regions behaving like a remote target.
#[derive(Debug)]
pub struct MemoryImage {
    regions: RwLock<Vec<Region>>,
    pointer_size: usize,
    alive: AtomicBool,
    writes: AtomicUsize,
    hooks: Mutex<Vec<u64>>,
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::new(8)
    }
}

impl MemoryImage {
    pub fn new(pointer_size: usize) -> Self {
        Self {
            regions: RwLock::new(Vec::new()),
            pointer_size,
            alive: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Builder: add a writable region.
    pub fn with_region(self, base: u64, bytes: Vec<u8>) -> Self {
        self.map(base, bytes, true);
        self
    }

    /// Builder: add a region that rejects writes.
    pub fn with_readonly_region(self, base: u64, bytes: Vec<u8>) -> Self {
        self.map(base, bytes, false);
        self
    }

    /// Map a region. Regions overlapping an existing one are ignored.
    pub fn map(&self, base: u64, bytes: Vec<u8>, writable: bool) -> bool {
        let region = Region {
            base,
            bytes,
            writable,
        };
        let mut regions = self.regions.write().unwrap_or_else(|e| e.into_inner());
        if regions
            .iter()
            .any(|r| region.base < r.end() && r.base < region.end())
        {
            debug!(base = format_args!("{:#x}", base), "Overlapping region not mapped");
            return false;
        }
        regions.push(region);
        regions.sort_by_key(|r| r.base);
        true
    }

    /// Simulate the target process exiting; every later call fails.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Addresses passed to `hook_native`, in order.
    pub fn hooks(&self) -> Vec<u64> {
        self.hooks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn check_alive(&self) -> Result<(), RemoteError> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::ProcessGone)
        }
    }
}

impl RemoteMemory for MemoryImage {
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, RemoteError> {
        self.check_alive()?;
        let regions = self.regions.read().unwrap_or_else(|e| e.into_inner());
        let region = regions
            .iter()
            .find(|r| r.contains(address))
            .ok_or(RemoteError::Inaccessible { address })?;
        let start = (address - region.base) as usize;
        // Reads may continue into an adjacent region.
        let mut out = Vec::with_capacity(length);
        let end = (start + length).min(region.bytes.len());
        out.extend_from_slice(&region.bytes[start..end]);
        let mut next = region.end();
        while out.len() < length {
            match regions.iter().find(|r| r.base == next) {
                Some(r) => {
                    let take = (length - out.len()).min(r.bytes.len());
                    out.extend_from_slice(&r.bytes[..take]);
                    next = r.end();
                }
                None => break,
            }
        }
        trace!(
            address = format_args!("{:#x}", address),
            requested = length,
            returned = out.len(),
            "image read"
        );
        Ok(out)
    }

    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<(), RemoteError> {
        self.check_alive()?;
        let mut regions = self.regions.write().unwrap_or_else(|e| e.into_inner());
        let end = address
            .checked_add(bytes.len() as u64)
            .ok_or(RemoteError::Inaccessible { address })?;
        let region = regions
            .iter_mut()
            .find(|r| r.contains(address))
            .ok_or(RemoteError::Inaccessible { address })?;
        if end > region.end() {
            return Err(RemoteError::Inaccessible {
                address: region.end(),
            });
        }
        if !region.writable {
            return Err(RemoteError::Protection { address });
        }
        let start = (address - region.base) as usize;
        region.bytes[start..start + bytes.len()].copy_from_slice(bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(
            address = format_args!("{:#x}", address),
            len = bytes.len(),
            "image write"
        );
        Ok(())
    }

    fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    fn hook_native(&self, address: u64) -> Result<(), RemoteError> {
        self.check_alive()?;
        self.hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(address);
        Ok(())
    }
}
