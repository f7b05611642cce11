//! Error types for the memview engine.
//!
//! Remote, decoder and encoder layers keep their own error enums; this
//! module defines the engine-level taxonomy they are converted into, with
//! the failing address attached where one is known.

use thiserror::Error;

use crate::core::disassembler::{DisassemblerError, EncodeError};
use crate::remote::RemoteError;

/// Main error type for memview operations.
#[derive(Debug, Error)]
pub enum MemViewError {
    /// Pointer cannot anchor a range (null, or not resolvable)
    #[error("Invalid pointer: {0:#x}")]
    InvalidPointer(u64),

    /// Access outside the resolved part of the active range
    #[error("Out of bounds: offset {offset:#x} (len {len}) not within [0, {tail:#x})")]
    OutOfBounds { offset: u64, len: usize, tail: u64 },

    /// The remote API failed to read memory
    #[error("Remote read failed at {address:#x} (len {len}): {source}")]
    RemoteReadFailure {
        address: u64,
        len: usize,
        #[source]
        source: RemoteError,
    },

    /// The remote API failed or refused to write memory
    #[error("Remote write failed at {address:#x} (len {len}): {source}")]
    RemoteWriteFailure {
        address: u64,
        len: usize,
        #[source]
        source: RemoteError,
    },

    /// The decoder backend could not be created or failed outright
    #[error("Decode failure: {0}")]
    DecodeFailure(#[from] DisassemblerError),

    /// Assembly text could not be encoded for the requested mode
    #[error("Encode failure: {0}")]
    EncodeFailure(#[from] EncodeError),

    /// An operation needs an open range and none is active
    #[error("No memory range is open")]
    NoActiveRange,

    /// A bounded wait elapsed
    #[error("Timed out after {millis}ms waiting for {what}")]
    Timeout { what: &'static str, millis: u64 },

    /// A pointer expression could not be evaluated
    #[error("Invalid expression '{text}': {source}")]
    InvalidExpression {
        text: String,
        #[source]
        source: RemoteError,
    },

    /// Hex input could not be parsed into bytes
    #[error("Invalid hex input: {0}")]
    InvalidHex(String),

    /// Configuration value rejected by validation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration (de)serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for memview operations
pub type Result<T> = std::result::Result<T, MemViewError>;

impl MemViewError {
    /// True for failures reported by the remote target rather than the engine.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            MemViewError::RemoteReadFailure { .. } | MemViewError::RemoteWriteFailure { .. }
        )
    }
}
