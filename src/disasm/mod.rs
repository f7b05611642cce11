//! Disassembly: decoder backends, their registry and the session engine.
//!
//! Backends:
//! - capstone for ARM (A32/T32) and AArch64

pub mod capstone;
pub mod engine;
pub mod registry;

pub use engine::DisassemblyEngine;
pub use registry::{CapstoneProvider, DecoderProvider};
