use crate::core::disassembler::{ArchMode, Decoder, DisassemblerResult};

/// Source of decoders, consulted whenever a session changes mode.
pub trait DecoderProvider {
    fn decoder_for(&self, mode: ArchMode) -> DisassemblerResult<Box<dyn Decoder>>;
}

/// Provider backed by capstone.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapstoneProvider;

impl DecoderProvider for CapstoneProvider {
    fn decoder_for(&self, mode: ArchMode) -> DisassemblerResult<Box<dyn Decoder>> {
        for_mode(mode)
    }
}

/// Select a decoder backend for the given mode.
pub fn for_mode(mode: ArchMode) -> DisassemblerResult<Box<dyn Decoder>> {
    match mode {
        ArchMode::Arm32Arm | ArchMode::Arm32Thumb | ArchMode::Arm64 => {
            Ok(Box::new(super::capstone::CapstoneDecoder::new(mode)?))
        }
    }
}
