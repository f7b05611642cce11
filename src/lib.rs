//! memview: a paged, editable view over a remote process's memory.
//!
//! `view::MemoryViewEngine` fetches a window around a pointer, fills its
//! 16-byte rows in the background outward from the focus row, and keeps the
//! cached window consistent with the target across writes.
//! `disasm::DisassemblyEngine` lists and patches instructions in that window.

/// Configuration for windows, population pacing and disassembly bounds
pub mod config;

/// Core data types module
pub mod core;

/// Decoder backends and disassembly sessions
pub mod disasm;

/// Error types
pub mod error;

/// Tracing setup
pub mod logging;

/// Remote memory API and backends
pub mod remote;

/// The paged memory view
pub mod view;

pub use config::ViewConfig;
pub use crate::core::disassembler::{ArchMode, Assembler, Decoder};
pub use crate::core::instruction::Instruction;
pub use crate::core::row::Row;
pub use disasm::DisassemblyEngine;
pub use error::{MemViewError, Result};
pub use remote::{RemoteError, RemoteMemory};
pub use view::{MemoryViewEngine, PopulationEvent, PopulationOutcome, RowView, ViewDescriptor};
