use capstone::{Arch, Capstone, Endian, Mode, NO_EXTRA_MODE};

use crate::core::disassembler::{ArchMode, Decoder, DisassemblerError, DisassemblerResult};
use crate::core::instruction::Instruction;

/// Capstone-backed decoder for one ARM mode.
pub struct CapstoneDecoder {
    cs: Capstone,
    mode: ArchMode,
}

fn cs_arch_mode(mode: ArchMode) -> (Arch, Mode) {
    match mode {
        ArchMode::Arm32Arm => (Arch::ARM, Mode::Arm),
        ArchMode::Arm32Thumb => (Arch::ARM, Mode::Thumb),
        ArchMode::Arm64 => (Arch::ARM64, Mode::Arm),
    }
}

impl CapstoneDecoder {
    pub fn new(mode: ArchMode) -> DisassemblerResult<Self> {
        let (arch, cs_mode) = cs_arch_mode(mode);
        let cs = Capstone::new_raw(arch, cs_mode, NO_EXTRA_MODE, Some(Endian::Little))
            .map_err(|e| DisassemblerError::InternalError(e.to_string()))?;
        Ok(Self { cs, mode })
    }
}

impl Decoder for CapstoneDecoder {
    fn decode(
        &self,
        bytes: &[u8],
        address: u64,
        max_instructions: usize,
    ) -> DisassemblerResult<Vec<Instruction>> {
        // capstone rejects a zero count
        if bytes.is_empty() || max_instructions == 0 {
            return Ok(Vec::new());
        }
        let insns = self
            .cs
            .disasm_count(bytes, address, max_instructions)
            .map_err(|e| DisassemblerError::InternalError(e.to_string()))?;
        Ok(insns
            .iter()
            .map(|insn| {
                Instruction::new(
                    insn.address(),
                    insn.mnemonic().unwrap_or("").to_string(),
                    insn.op_str().unwrap_or("").to_string(),
                    insn.bytes().to_vec(),
                )
            })
            .collect())
    }

    fn mode(&self) -> ArchMode {
        self.mode
    }

    fn name(&self) -> &str {
        "capstone"
    }
}
