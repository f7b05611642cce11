//! Decoded instruction type.
//!
//! Instructions are produced by a `Decoder` for one disassembly pass and are
//! not persisted; the listing is rebuilt after every mode swap or patch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded assembly instruction at a specific address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Address of the first byte
    pub address: u64,
    /// Instruction mnemonic (e.g., "mov", "bl")
    pub mnemonic: String,
    /// Operand text as rendered by the backend
    pub op_str: String,
    /// Raw encoded bytes
    pub bytes: Vec<u8>,
}

impl Instruction {
    pub fn new(address: u64, mnemonic: String, op_str: String, bytes: Vec<u8>) -> Self {
        Self {
            address,
            mnemonic,
            op_str,
            bytes,
        }
    }

    /// Encoded length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Address one past the last byte
    pub fn end_address(&self) -> u64 {
        self.address.saturating_add(self.bytes.len() as u64)
    }

    /// Assembly text suitable for re-encoding, "mnemonic op_str".
    pub fn text(&self) -> String {
        if self.op_str.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.op_str)
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}: {}", self.address, self.text())
    }
}
