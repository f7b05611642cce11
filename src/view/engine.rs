//! MemoryViewEngine: one scrollable, editable view over a remote range.
//!
//! The engine owns the active `MemoryRange`, its row cache and the populator
//! filling that cache. Every mutation goes to the remote first; only an
//! acknowledged write invalidates the range and triggers a re-read, so the
//! view never presents pre-write bytes as current.

use bytes::Bytes;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ViewConfig;
use crate::core::row::{parse_hex, Row, ROW_WIDTH};
use crate::error::{MemViewError, Result};
use crate::remote::RemoteMemory;
use crate::view::cache::RowCache;
use crate::view::populator::{
    IncrementalPopulator, PopulationCursor, PopulationEvent, PopulationJob, PopulationOutcome,
};
use crate::view::range::{InitStatus, MemoryRange};

/// Bytes shown by the hex editor when editing at an address.
pub const EDIT_WIDTH: usize = 16;

/// What `open_range` produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub base: u64,
    pub size: usize,
    /// Resolved bytes; rows at or beyond `tail` are unreadable.
    pub tail: usize,
    pub start_address: u64,
    pub row_count: usize,
    pub focus_row: usize,
    /// Generation of the population filling this view.
    pub generation: u64,
    /// The pointer was inside the current range and its rows were kept.
    pub reused: bool,
}

/// State of one row as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowView {
    Ready(Row),
    /// Not reached by the population yet.
    Pending { address: u64 },
    /// Beyond the resolved bytes of the range.
    Unreadable { address: u64 },
    /// The range was invalidated and has not been re-read.
    Stale { address: u64 },
}

impl RowView {
    pub fn address(&self) -> u64 {
        match self {
            RowView::Ready(row) => row.address,
            RowView::Pending { address }
            | RowView::Unreadable { address }
            | RowView::Stale { address } => *address,
        }
    }

    pub fn row(&self) -> Option<&Row> {
        match self {
            RowView::Ready(row) => Some(row),
            _ => None,
        }
    }
}

pub struct MemoryViewEngine<R: RemoteMemory> {
    remote: R,
    config: ViewConfig,
    range: MemoryRange,
    cache: Arc<RowCache>,
    populator: IncrementalPopulator,
}

impl<R: RemoteMemory> MemoryViewEngine<R> {
    /// Build an engine over `remote`; `config` must pass `ViewConfig::validate`.
    pub fn new(remote: R, config: ViewConfig) -> Result<Self> {
        config.validate()?;
        let populator = IncrementalPopulator::new(config.populator.clone());
        Ok(Self {
            remote,
            config,
            range: MemoryRange::default(),
            cache: Arc::new(RowCache::new(0, 0)),
            populator,
        })
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn range(&self) -> &MemoryRange {
        &self.range
    }

    pub fn cache(&self) -> &Arc<RowCache> {
        &self.cache
    }

    pub fn cursor(&self) -> Option<PopulationCursor> {
        self.populator.cursor()
    }

    /// Receive population events from the next population on.
    pub fn subscribe(&mut self) -> Receiver<PopulationEvent> {
        let (tx, rx) = mpsc::channel();
        self.populator.set_events(Some(tx));
        rx
    }

    /// Descriptor of the active range, if one is open.
    pub fn descriptor(&self) -> Option<ViewDescriptor> {
        (!self.range.is_empty()).then(|| self.describe(false))
    }

    fn describe(&self, reused: bool) -> ViewDescriptor {
        ViewDescriptor {
            base: self.range.base(),
            size: self.range.size(),
            tail: self.range.tail(),
            start_address: self.range.start_address(),
            row_count: self.range.row_count(),
            focus_row: self.range.focus_row(),
            generation: self.populator.generation(),
            reused,
        }
    }

    /// Make the window around `ptr` the active range and start populating
    /// it from the row holding `ptr`.
    ///
    /// A pointer inside the current fresh range keeps its populated rows. On
    /// failure the previous view stays active.
    pub fn open_range(&mut self, ptr: u64) -> Result<ViewDescriptor> {
        let _span = crate::span_trace!("open_range", ptr = format_args!("{:#x}", ptr)).entered();

        let status = self
            .range
            .init_with_address(&self.remote, ptr, &self.config.window)
            .map_err(|e| crate::log_error!(e, "open_range"))?;
        let reused = status == InitStatus::Reused;
        if !reused {
            self.cache = Arc::new(RowCache::new(self.range.base(), self.range.row_count()));
        }

        self.populator.start(PopulationJob {
            cache: Arc::clone(&self.cache),
            data: self.range.data().clone(),
            size: self.range.size(),
            start_row: self.range.focus_row(),
        })?;

        let descriptor = self.describe(reused);
        debug!(
            base = format_args!("{:#x}", descriptor.base),
            size = descriptor.size,
            rows = descriptor.row_count,
            focus = descriptor.focus_row,
            reused,
            "Opened range"
        );
        Ok(descriptor)
    }

    /// Re-read the active range around its start address.
    pub fn refresh(&mut self) -> Result<ViewDescriptor> {
        if self.range.is_empty() {
            return Err(MemViewError::NoActiveRange);
        }
        let ptr = self.range.start_address();
        self.range.invalidate();
        self.open_range(ptr)
    }

    /// Evaluate a pointer expression on the remote and open a range there.
    pub fn jump_to(&mut self, text: &str) -> Result<ViewDescriptor> {
        let ptr = self
            .remote
            .evaluate_pointer_expression(text)
            .map_err(|source| MemViewError::InvalidExpression {
                text: text.to_string(),
                source,
            })?;
        self.open_range(ptr)
    }

    /// Current state of `row`.
    pub fn read_row(&self, row: usize) -> Result<RowView> {
        if row >= self.range.row_count() {
            return Err(MemViewError::OutOfBounds {
                offset: (row as u64).saturating_mul(ROW_WIDTH as u64),
                len: ROW_WIDTH,
                tail: self.range.tail() as u64,
            });
        }
        let offset = row * ROW_WIDTH;
        let address = self.range.base() + offset as u64;
        if self.range.is_stale() {
            return Ok(RowView::Stale { address });
        }
        if let Some(ready) = self.cache.get(row) {
            return Ok(RowView::Ready(ready.clone()));
        }
        if offset >= self.range.tail() {
            Ok(RowView::Unreadable { address })
        } else {
            Ok(RowView::Pending { address })
        }
    }

    pub fn row_of(&self, address: u64) -> Option<usize> {
        self.range.row_of(address)
    }

    /// Address of the byte at (`row`, `col`), if resolved.
    pub fn cell_address(&self, row: usize, col: usize) -> Option<u64> {
        if col >= ROW_WIDTH {
            return None;
        }
        let offset = row.checked_mul(ROW_WIDTH)?.checked_add(col)?;
        (offset < self.range.tail()).then(|| self.range.base() + offset as u64)
    }

    /// Shared bytes of the range from `address` to its tail.
    pub fn bytes_from(&self, address: u64) -> Result<Bytes> {
        let offset = self.range.offset_of(address).ok_or(MemViewError::OutOfBounds {
            offset: address.wrapping_sub(self.range.base()),
            len: 0,
            tail: self.range.tail() as u64,
        })?;
        self.range.slice_from(offset)
    }

    pub fn wait_population(&mut self, timeout: Duration) -> Result<PopulationOutcome> {
        self.populator.wait(timeout)
    }

    /// Stop the running population and wait for it.
    pub fn stop_population(&mut self) -> Result<Option<PopulationOutcome>> {
        self.populator.halt()
    }

    /// Write `bytes` at `address`, then re-open the view around `address`.
    ///
    /// A rejected write returns the remote error and leaves the view as it
    /// was. If the write lands but the re-read fails, the range stays stale
    /// and rows report `RowView::Stale` until `refresh` succeeds.
    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.remote.write_bytes(address, bytes).map_err(|source| {
            crate::log_error!(MemViewError::RemoteWriteFailure {
                address,
                len: bytes.len(),
                source,
            })
        })?;
        debug!(
            address = format_args!("{:#x}", address),
            len = bytes.len(),
            "Wrote bytes"
        );
        self.after_write(address);
        Ok(())
    }

    /// Write `text` as UTF-8; NUL bytes are written like any other.
    pub fn write_string(&mut self, address: u64, text: &str) -> Result<()> {
        self.remote.write_utf8(address, text).map_err(|source| {
            crate::log_error!(MemViewError::RemoteWriteFailure {
                address,
                len: text.len(),
                source,
            })
        })?;
        debug!(
            address = format_args!("{:#x}", address),
            len = text.len(),
            "Wrote string"
        );
        self.after_write(address);
        Ok(())
    }

    /// Parse whitespace separated hex and write it at `address`.
    pub fn write_hex(&mut self, address: u64, text: &str) -> Result<()> {
        let bytes = parse_hex(text)?;
        self.write_bytes(address, &bytes)
    }

    fn after_write(&mut self, address: u64) {
        self.range.invalidate();
        if let Err(e) = self.open_range(address) {
            warn!(
                address = format_args!("{:#x}", address),
                error = %e,
                "Re-read after write failed, view is stale"
            );
        }
    }

    /// Fresh bytes at `address` for the hex editor.
    ///
    /// The range is re-opened at `address` first when the edit would run past
    /// its end.
    pub fn read_for_edit(&mut self, address: u64) -> Result<Vec<u8>> {
        let fits = self.range.contains(address)
            && address
                .checked_add(EDIT_WIDTH as u64)
                .is_some_and(|end| end <= self.range.end());
        if !fits {
            self.open_range(address)?;
        }
        self.remote
            .read_bytes(address, EDIT_WIDTH)
            .map_err(|source| MemViewError::RemoteReadFailure {
                address,
                len: EDIT_WIDTH,
                source,
            })
    }

    /// Read the pointer stored at `byte_offset` of the range.
    pub fn follow_pointer(&self, byte_offset: usize) -> Result<u64> {
        let size = self.remote.pointer_size();
        self.range.read(byte_offset, 1)?;
        let address = self.range.base() + byte_offset as u64;
        let target = self
            .remote
            .read_pointer(address)
            .map_err(|source| MemViewError::RemoteReadFailure {
                address,
                len: size,
                source,
            })?;
        debug!(
            address = format_args!("{:#x}", address),
            target = format_args!("{:#x}", target),
            "Followed pointer"
        );
        Ok(target)
    }

    /// Install a native hook at an address of the range.
    pub fn hook_address(&self, address: u64) -> Result<()> {
        if !self.range.contains(address) {
            return Err(MemViewError::OutOfBounds {
                offset: address.wrapping_sub(self.range.base()),
                len: 1,
                tail: self.range.tail() as u64,
            });
        }
        self.remote
            .hook_native(address)
            .map_err(|source| MemViewError::RemoteWriteFailure {
                address,
                len: 0,
                source,
            })?;
        debug!(address = format_args!("{:#x}", address), "Hooked address");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PopulatorConfig, WindowConfig};
    use crate::remote::image::MemoryImage;

    fn config() -> ViewConfig {
        ViewConfig {
            window: WindowConfig {
                page_size: 0x100,
                pages_before: 0,
                pages_after: 0,
            },
            populator: PopulatorConfig {
                step_interval_ms: 0,
                stop_timeout_ms: 2000,
            },
            ..ViewConfig::default()
        }
    }

    fn engine() -> MemoryViewEngine<Arc<MemoryImage>> {
        let image = MemoryImage::default().with_region(0x1000, (0..=255u8).collect());
        MemoryViewEngine::new(Arc::new(image), config()).unwrap()
    }

    fn settle<R: RemoteMemory>(engine: &mut MemoryViewEngine<R>) {
        engine.wait_population(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn open_and_read_rows() {
        let mut engine = engine();
        let d = engine.open_range(0x1042).unwrap();
        assert_eq!((d.base, d.size, d.row_count, d.focus_row), (0x1000, 256, 16, 4));
        assert!(!d.reused);
        settle(&mut engine);
        let row = engine.read_row(4).unwrap();
        assert_eq!(row.address(), 0x1040);
        assert_eq!(row.row().unwrap().bytes[2], 0x42);
        assert!(engine.read_row(16).is_err());
    }

    #[test]
    fn reopening_inside_range_reuses_rows() {
        let mut engine = engine();
        engine.open_range(0x1000).unwrap();
        settle(&mut engine);
        let cache = Arc::clone(engine.cache());
        let d = engine.open_range(0x10f0).unwrap();
        assert!(d.reused);
        assert_eq!(d.focus_row, 15);
        assert!(Arc::ptr_eq(&cache, engine.cache()));
    }

    #[test]
    fn cell_addressing() {
        let mut engine = engine();
        engine.open_range(0x1000).unwrap();
        assert_eq!(engine.cell_address(1, 3), Some(0x1013));
        assert_eq!(engine.cell_address(1, 16), None);
        assert_eq!(engine.cell_address(16, 0), None);
        assert_eq!(engine.row_of(0x10ff), Some(15));
        assert_eq!(engine.row_of(0x1100), None);
    }

    #[test]
    fn hex_edit_round() {
        let mut engine = engine();
        engine.open_range(0x1000).unwrap();
        let current = engine.read_for_edit(0x1020).unwrap();
        assert_eq!(current.len(), EDIT_WIDTH);
        assert_eq!(current[0], 0x20);
        engine.write_hex(0x1020, "de ad").unwrap();
        settle(&mut engine);
        assert_eq!(&engine.read_row(2).unwrap().row().unwrap().bytes[..2], &[0xde, 0xad]);
        assert!(matches!(
            engine.write_hex(0x1020, "zz"),
            Err(MemViewError::InvalidHex(_))
        ));
    }

    #[test]
    fn hook_requires_address_in_range() {
        let mut engine = engine();
        engine.open_range(0x1000).unwrap();
        engine.hook_address(0x1010).unwrap();
        assert_eq!(engine.remote().hooks(), vec![0x1010]);
        assert!(matches!(
            engine.hook_address(0x2000),
            Err(MemViewError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn refresh_without_range_fails() {
        let mut engine = engine();
        assert!(engine.descriptor().is_none());
        assert!(matches!(engine.refresh(), Err(MemViewError::NoActiveRange)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let image = Arc::new(MemoryImage::default().with_region(0x1000, vec![0; 0x100]));
        let mut bad = config();
        bad.window.page_size = 0;
        assert!(matches!(
            MemoryViewEngine::new(Arc::clone(&image), bad),
            Err(MemViewError::Config(_))
        ));

        let mut bad = config();
        bad.window.page_size = 0x180;
        assert!(MemoryViewEngine::new(Arc::clone(&image), bad).is_err());

        let mut bad = config();
        bad.populator.stop_timeout_ms = 0;
        assert!(MemoryViewEngine::new(image, bad).is_err());
    }

    #[test]
    fn write_reopens_at_written_address() {
        let mut engine = engine();
        engine.open_range(0x1000).unwrap();
        settle(&mut engine);
        engine.write_bytes(0x1080, &[0x55]).unwrap();
        let d = engine.descriptor().unwrap();
        assert_eq!((d.base, d.start_address, d.focus_row), (0x1000, 0x1080, 8));
        settle(&mut engine);
        assert_eq!(engine.read_row(8).unwrap().row().unwrap().bytes[0], 0x55);
    }
}
