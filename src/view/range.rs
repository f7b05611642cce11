//! MemoryRange: a locally cached window of remote memory.
//!
//! The buffer is a `Bytes` so the population worker and disassembly
//! sessions can hold cheap clones while the engine replaces the range.
//! Remote writes are never mirrored into the buffer; the range is
//! invalidated and fetched again instead.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::WindowConfig;
use crate::core::row::{row_count, ROW_WIDTH};
use crate::error::{MemViewError, Result};
use crate::remote::RemoteMemory;

/// How `init_with_address` satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// A new window was read from the target.
    Fetched,
    /// The pointer was inside the current, fresh range; only the focus moved.
    Reused,
}

/// Cached window `[base, base + size)` of remote memory, of which the first
/// `tail` bytes were resolved.
#[derive(Debug, Clone, Default)]
pub struct MemoryRange {
    base: u64,
    size: usize,
    start_address: u64,
    data: Bytes,
    stale: bool,
}

impl MemoryRange {
    /// Fetch the window around `ptr` into a new range.
    ///
    /// The full configured window is tried first; when part of it is not
    /// readable, the single page holding `ptr` is tried before giving up.
    pub fn fetch<R: RemoteMemory + ?Sized>(
        remote: &R,
        ptr: u64,
        window: &WindowConfig,
    ) -> Result<MemoryRange> {
        if ptr == 0 {
            return Err(MemViewError::InvalidPointer(ptr));
        }
        let (base, size) = window.window_for(ptr);
        let (base, size, data) = match remote.read_bytes(base, size as usize) {
            Ok(data) if base + data.len() as u64 > ptr => (base, size as usize, data),
            first => {
                let page = window.page_of(ptr);
                match &first {
                    Ok(data) => warn!(
                        base = format_args!("{:#x}", base),
                        got = data.len(),
                        "window read ended before pointer, retrying pointer page"
                    ),
                    Err(e) => warn!(
                        base = format_args!("{:#x}", base),
                        error = %e,
                        "window read failed, retrying pointer page"
                    ),
                }
                let len = window.page_size.min(u64::MAX - page) as usize;
                let data = remote.read_bytes(page, len).map_err(|source| {
                    MemViewError::RemoteReadFailure {
                        address: page,
                        len,
                        source,
                    }
                })?;
                (page, len, data)
            }
        };
        if data.is_empty() || base + (data.len() as u64) <= ptr {
            return Err(MemViewError::RemoteReadFailure {
                address: ptr,
                len: 1,
                source: crate::remote::RemoteError::Inaccessible { address: ptr },
            });
        }
        debug!(
            base = format_args!("{:#x}", base),
            size,
            tail = data.len(),
            ptr = format_args!("{:#x}", ptr),
            "Fetched memory range"
        );
        Ok(MemoryRange {
            base,
            size,
            start_address: ptr,
            data: Bytes::from(data),
            stale: false,
        })
    }

    /// Point this range at `ptr`, reusing the buffer when possible.
    ///
    /// On error the range is left untouched.
    pub fn init_with_address<R: RemoteMemory + ?Sized>(
        &mut self,
        remote: &R,
        ptr: u64,
        window: &WindowConfig,
    ) -> Result<InitStatus> {
        if ptr != 0 && !self.stale && self.contains(ptr) {
            self.start_address = ptr;
            return Ok(InitStatus::Reused);
        }
        *self = MemoryRange::fetch(remote, ptr, window)?;
        Ok(InitStatus::Fetched)
    }

    /// Mark the buffer stale; it is kept until the next fetch replaces it.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of resolved bytes; equal to `size` once fully fetched.
    pub fn tail(&self) -> usize {
        self.data.len()
    }

    pub fn start_address(&self) -> u64 {
        self.start_address
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// End address of the resolved bytes (exclusive).
    pub fn end(&self) -> u64 {
        self.base + self.tail() as u64
    }

    /// True when `address` lies within the resolved bytes.
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }

    /// Byte offset of `address`, if contained.
    pub fn offset_of(&self, address: u64) -> Option<usize> {
        self.contains(address)
            .then(|| (address - self.base) as usize)
    }

    /// Bounds-checked read of `len` bytes at `offset`.
    pub fn read(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset.checked_add(len);
        match end {
            Some(end) if end <= self.tail() => Ok(&self.data[offset..end]),
            _ => Err(MemViewError::OutOfBounds {
                offset: offset as u64,
                len,
                tail: self.tail() as u64,
            }),
        }
    }

    /// Shared slice of the resolved bytes from `offset` to the tail.
    pub fn slice_from(&self, offset: usize) -> Result<Bytes> {
        if offset >= self.tail() {
            return Err(MemViewError::OutOfBounds {
                offset: offset as u64,
                len: 0,
                tail: self.tail() as u64,
            });
        }
        Ok(self.data.slice(offset..))
    }

    pub fn row_count(&self) -> usize {
        row_count(self.size)
    }

    /// Row holding `address`.
    pub fn row_of(&self, address: u64) -> Option<usize> {
        self.offset_of(address).map(|off| off / ROW_WIDTH)
    }

    /// Row the view should focus on: the one holding `start_address`.
    pub fn focus_row(&self) -> usize {
        self.row_of(self.start_address).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::image::MemoryImage;

    fn window() -> WindowConfig {
        WindowConfig {
            page_size: 0x100,
            pages_before: 1,
            pages_after: 1,
        }
    }

    fn image() -> MemoryImage {
        MemoryImage::default().with_region(0x1000, (0..0x300u32).map(|i| i as u8).collect())
    }

    #[test]
    fn fetch_full_window() {
        let img = image();
        let range = MemoryRange::fetch(&img, 0x1180, &window()).unwrap();
        assert_eq!(range.base(), 0x1000);
        assert_eq!(range.size(), 0x300);
        assert_eq!(range.tail(), range.size());
        assert_eq!(range.start_address(), 0x1180);
        assert_eq!(range.focus_row(), 0x18);
        assert_eq!(range.row_count(), 0x30);
    }

    #[test]
    fn fetch_falls_back_to_pointer_page() {
        // page before 0x1000 is unmapped
        let img = image();
        let range = MemoryRange::fetch(&img, 0x1010, &window()).unwrap();
        assert_eq!(range.base(), 0x1000);
        assert_eq!(range.size(), 0x100);
        assert_eq!(range.focus_row(), 1);
    }

    #[test]
    fn short_window_keeps_resolved_prefix() {
        // readable memory ends at 0x1280, inside the window
        let img = MemoryImage::default().with_region(0x1000, vec![0x41; 0x280]);
        let range = MemoryRange::fetch(&img, 0x1210, &window()).unwrap();
        assert_eq!(range.base(), 0x1100);
        assert_eq!(range.size(), 0x200);
        assert_eq!(range.tail(), 0x180);
        assert_eq!(range.row_count(), 0x20);
        assert!(range.contains(0x127f));
        assert!(!range.contains(0x1280));
        assert!(range.read(0x17f, 1).is_ok());
        assert!(matches!(
            range.read(0x180, 1),
            Err(MemViewError::OutOfBounds { tail: 0x180, .. })
        ));
    }

    #[test]
    fn null_and_unmapped_pointers_fail() {
        let img = image();
        assert!(matches!(
            MemoryRange::fetch(&img, 0, &window()),
            Err(MemViewError::InvalidPointer(0))
        ));
        assert!(matches!(
            MemoryRange::fetch(&img, 0x9000, &window()),
            Err(MemViewError::RemoteReadFailure { address: 0x9000, .. })
        ));
    }

    #[test]
    fn reuse_only_when_fresh_and_contained() {
        let img = image();
        let mut range = MemoryRange::default();
        assert_eq!(
            range.init_with_address(&img, 0x1180, &window()).unwrap(),
            InitStatus::Fetched
        );
        assert_eq!(
            range.init_with_address(&img, 0x1010, &window()).unwrap(),
            InitStatus::Reused
        );
        assert_eq!(range.focus_row(), 1);
        range.invalidate();
        assert!(range.is_stale());
        assert_eq!(
            range.init_with_address(&img, 0x1010, &window()).unwrap(),
            InitStatus::Fetched
        );
        assert!(!range.is_stale());
    }

    #[test]
    fn failed_init_leaves_range_untouched() {
        let img = image();
        let mut range = MemoryRange::fetch(&img, 0x1180, &window()).unwrap();
        assert!(range.init_with_address(&img, 0x9000, &window()).is_err());
        assert_eq!(range.base(), 0x1000);
        assert_eq!(range.start_address(), 0x1180);
    }

    #[test]
    fn bounded_reads() {
        let img = image();
        let range = MemoryRange::fetch(&img, 0x1180, &window()).unwrap();
        assert_eq!(range.read(0x10, 2).unwrap(), &[0x10, 0x11]);
        assert!(matches!(
            range.read(0x2ff, 2),
            Err(MemViewError::OutOfBounds { offset: 0x2ff, len: 2, tail: 0x300 })
        ));
        assert!(range.read(usize::MAX, 2).is_err());
        assert_eq!(range.slice_from(0x2fe).unwrap().as_ref(), &[0xfe, 0xff]);
        assert!(range.slice_from(0x300).is_err());
    }
}
