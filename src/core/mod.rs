//! Core data types for the memview engine.
//!
//! Rows of the byte grid, decoded instructions, and the instruction-set
//! mode shared by decoder and encoder backends.

pub mod disassembler;
pub mod instruction;
pub mod row;
