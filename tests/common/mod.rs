//! Common test utilities and helpers.
#![allow(dead_code)]

use memview::config::{PopulatorConfig, ViewConfig, WindowConfig};
use memview::core::disassembler::{ArchMode, Assembler, EncodeError};
use memview::remote::image::MemoryImage;
use memview::remote::{RemoteError, RemoteMemory};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(5);

/// Config with no pause between population steps.
pub fn fast_config() -> ViewConfig {
    ViewConfig {
        populator: PopulatorConfig {
            step_interval_ms: 0,
            stop_timeout_ms: 2000,
        },
        ..ViewConfig::default()
    }
}

/// Config whose window is exactly the pointer's 0x100-byte page.
pub fn single_page_config() -> ViewConfig {
    ViewConfig {
        window: WindowConfig {
            page_size: 0x100,
            pages_before: 0,
            pages_after: 0,
        },
        ..fast_config()
    }
}

/// Bytes where each value is its offset, wrapping at 256.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| i as u8).collect()
}

pub fn image_with(base: u64, bytes: Vec<u8>) -> Arc<MemoryImage> {
    Arc::new(MemoryImage::default().with_region(base, bytes))
}

/// Encoder that knows a handful of fixed instructions.
pub struct ScriptedAssembler {
    calls: Arc<AtomicUsize>,
}

impl ScriptedAssembler {
    /// The assembler and a counter of `assemble` calls.
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl Assembler for ScriptedAssembler {
    fn assemble(&self, mode: ArchMode, text: &str, _address: u64) -> Result<Vec<u8>, EncodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match (mode, text) {
            (ArchMode::Arm64, "nop") => Ok(vec![0x1f, 0x20, 0x03, 0xd5]),
            (ArchMode::Arm64, "ret") => Ok(vec![0xc0, 0x03, 0x5f, 0xd6]),
            (ArchMode::Arm32Arm, "nop") => Ok(vec![0x00, 0xf0, 0x20, 0xe3]),
            (ArchMode::Arm32Thumb, "nop") => Ok(vec![0x00, 0xbf]),
            (_, "nothing") => Ok(Vec::new()),
            _ => Err(EncodeError::Syntax(text.to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Target whose reads start failing right after a write is acknowledged.
pub struct BlindAfterWrite {
    pub image: MemoryImage,
    pub blind: AtomicBool,
}

impl BlindAfterWrite {
    pub fn new(image: MemoryImage) -> Arc<Self> {
        Arc::new(Self {
            image,
            blind: AtomicBool::new(false),
        })
    }

    pub fn see_again(&self) {
        self.blind.store(false, Ordering::SeqCst);
    }
}

impl RemoteMemory for BlindAfterWrite {
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, RemoteError> {
        if self.blind.load(Ordering::SeqCst) {
            return Err(RemoteError::Inaccessible { address });
        }
        self.image.read_bytes(address, length)
    }

    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<(), RemoteError> {
        self.image.write_bytes(address, bytes)?;
        self.blind.store(true, Ordering::SeqCst);
        Ok(())
    }
}
