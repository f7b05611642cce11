//! Decoder/encoder traits and the instruction-set mode they are keyed by.
//!
//! This module defines the `Decoder` trait implemented by disassembler
//! backends (capstone, test doubles) and the `Assembler` trait behind which
//! an external encoder is plugged in. It also holds the closed `ArchMode`
//! enum that every decode/encode call site matches on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::core::instruction::Instruction;

/// Errors that can occur during disassembly operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisassemblerError {
    /// Unsupported mode for the selected backend
    UnsupportedMode(ArchMode),
    /// Internal backend error with message
    InternalError(String),
}

impl fmt::Display for DisassemblerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisassemblerError::UnsupportedMode(mode) => write!(f, "UnsupportedMode: {}", mode),
            DisassemblerError::InternalError(msg) => write!(f, "InternalError: {}", msg),
        }
    }
}

impl std::error::Error for DisassemblerError {}

/// Result type for disassembly operations
pub type DisassemblerResult<T> = Result<T, DisassemblerError>;

/// Errors reported by an encoder backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("invalid assembly syntax: {0}")]
    Syntax(String),
    #[error("unsupported in {mode} mode: {reason}")]
    Unsupported { mode: ArchMode, reason: String },
    #[error("encoder produced no bytes for '{0}'")]
    Empty(String),
}

/// Decoder/encoder configuration: an architecture plus its instruction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchMode {
    /// ARM32, A32 instruction set
    Arm32Arm,
    /// ARM32, T32 (THUMB) instruction set
    Arm32Thumb,
    /// AArch64, fixed A64 instruction set
    Arm64,
}

impl ArchMode {
    /// The mode reached by a swap: ARM and THUMB cycle, ARM64 stays put.
    pub fn toggled(&self) -> ArchMode {
        match self {
            ArchMode::Arm32Arm => ArchMode::Arm32Thumb,
            ArchMode::Arm32Thumb => ArchMode::Arm32Arm,
            ArchMode::Arm64 => ArchMode::Arm64,
        }
    }

    pub fn is_swappable(&self) -> bool {
        match self {
            ArchMode::Arm32Arm | ArchMode::Arm32Thumb => true,
            ArchMode::Arm64 => false,
        }
    }

    /// Default mode for a target architecture name as reported by the agent.
    pub fn for_target(arch: &str) -> Option<ArchMode> {
        match arch.trim().to_ascii_lowercase().as_str() {
            "arm64" | "aarch64" => Some(ArchMode::Arm64),
            "arm" | "arm32" => Some(ArchMode::Arm32Arm),
            _ => None,
        }
    }
}

impl fmt::Display for ArchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchMode::Arm32Arm => write!(f, "arm"),
            ArchMode::Arm32Thumb => write!(f, "thumb"),
            ArchMode::Arm64 => write!(f, "arm64"),
        }
    }
}

impl FromStr for ArchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arm" => Ok(ArchMode::Arm32Arm),
            "thumb" => Ok(ArchMode::Arm32Thumb),
            "arm64" | "aarch64" => Ok(ArchMode::Arm64),
            other => Err(format!("unknown arch mode '{}'", other)),
        }
    }
}

/// Core decoder trait that provides a common interface for instruction decoding
pub trait Decoder {
    /// Decode up to `max_instructions` instructions from `bytes`, the first
    /// one located at `address`.
    ///
    /// Decoding stops at the first byte sequence the backend cannot decode;
    /// the instructions decoded before it are returned.
    fn decode(
        &self,
        bytes: &[u8],
        address: u64,
        max_instructions: usize,
    ) -> DisassemblerResult<Vec<Instruction>>;

    /// Get the mode this decoder was configured for
    fn mode(&self) -> ArchMode;

    /// Get a human-readable name for this decoder
    fn name(&self) -> &str {
        "Generic Decoder"
    }
}

/// Encoder interface: assembly text to machine bytes.
pub trait Assembler {
    /// Encode `text` for `mode`, as if placed at `address`.
    fn assemble(&self, mode: ArchMode, text: &str, address: u64) -> Result<Vec<u8>, EncodeError>;

    fn name(&self) -> &str {
        "Generic Assembler"
    }
}

/// Placeholder encoder for decode-only sessions; every request fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableAssembler;

impl Assembler for UnavailableAssembler {
    fn assemble(&self, mode: ArchMode, _text: &str, _address: u64) -> Result<Vec<u8>, EncodeError> {
        Err(EncodeError::Unsupported {
            mode,
            reason: "no assembler backend configured".to_string(),
        })
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassembler_error_display() {
        assert_eq!(
            format!("{}", DisassemblerError::UnsupportedMode(ArchMode::Arm32Thumb)),
            "UnsupportedMode: thumb"
        );
        assert_eq!(
            format!("{}", DisassemblerError::InternalError("test".to_string())),
            "InternalError: test"
        );
    }

    #[test]
    fn test_mode_toggle_is_two_state_cycle() {
        assert_eq!(ArchMode::Arm32Arm.toggled(), ArchMode::Arm32Thumb);
        assert_eq!(ArchMode::Arm32Thumb.toggled(), ArchMode::Arm32Arm);
        assert_eq!(ArchMode::Arm32Arm.toggled().toggled(), ArchMode::Arm32Arm);
        assert_eq!(ArchMode::Arm64.toggled(), ArchMode::Arm64);
        assert!(!ArchMode::Arm64.is_swappable());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("thumb".parse::<ArchMode>(), Ok(ArchMode::Arm32Thumb));
        assert_eq!(" AArch64 ".parse::<ArchMode>(), Ok(ArchMode::Arm64));
        assert!("mips".parse::<ArchMode>().is_err());
        assert_eq!(ArchMode::for_target("arm64"), Some(ArchMode::Arm64));
        assert_eq!(ArchMode::for_target("arm"), Some(ArchMode::Arm32Arm));
        assert_eq!(ArchMode::for_target("x64"), None);
    }

    #[test]
    fn test_unavailable_assembler_refuses() {
        let err = UnavailableAssembler
            .assemble(ArchMode::Arm64, "nop", 0x1000)
            .unwrap_err();
        assert!(matches!(err, EncodeError::Unsupported { mode: ArchMode::Arm64, .. }));
    }
}
