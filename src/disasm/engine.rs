//! DisassemblyEngine: bounded decoding of a byte window plus instruction
//! patching through the view engine.
//!
//! A session holds the window being listed (a shared slice of the view's
//! range or bytes read for it) and the current `ArchMode`. Mode swaps and
//! patches re-decode the session window; patches never touch the window
//! locally, they re-read it after the write lands.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::DisasmConfig;
use crate::core::disassembler::{
    ArchMode, Assembler, Decoder, DisassemblerError, EncodeError, UnavailableAssembler,
};
use crate::core::instruction::Instruction;
use crate::disasm::registry::{CapstoneProvider, DecoderProvider};
use crate::error::{MemViewError, Result};
use crate::remote::RemoteMemory;
use crate::view::MemoryViewEngine;

#[derive(Debug, Clone)]
struct Session {
    base: u64,
    bytes: Bytes,
}

pub struct DisassemblyEngine {
    mode: ArchMode,
    decoder: Box<dyn Decoder>,
    provider: Box<dyn DecoderProvider>,
    assembler: Box<dyn Assembler>,
    limit: usize,
    session: Option<Session>,
    listing: Vec<Instruction>,
    last_patch_mode: Option<ArchMode>,
}

impl DisassemblyEngine {
    /// Capstone decoding plus the given encoder.
    pub fn new(mode: ArchMode, assembler: Box<dyn Assembler>, config: &DisasmConfig) -> Result<Self> {
        Self::with_provider(mode, Box::new(CapstoneProvider), assembler, config)
    }

    pub fn with_provider(
        mode: ArchMode,
        provider: Box<dyn DecoderProvider>,
        assembler: Box<dyn Assembler>,
        config: &DisasmConfig,
    ) -> Result<Self> {
        let decoder = provider.decoder_for(mode)?;
        Ok(Self {
            mode,
            decoder,
            provider,
            assembler,
            limit: config.instruction_limit,
            session: None,
            listing: Vec::new(),
            last_patch_mode: None,
        })
    }

    /// An engine that lists but cannot patch.
    pub fn decode_only(mode: ArchMode, config: &DisasmConfig) -> Result<Self> {
        Self::new(mode, Box::new(UnavailableAssembler), config)
    }

    /// Engine in the default mode for a target architecture name.
    pub fn for_target(
        arch: &str,
        assembler: Box<dyn Assembler>,
        config: &DisasmConfig,
    ) -> Result<Self> {
        let mode = ArchMode::for_target(arch).ok_or_else(|| {
            MemViewError::DecodeFailure(DisassemblerError::InternalError(format!(
                "unknown target architecture '{}'",
                arch
            )))
        })?;
        Self::new(mode, assembler, config)
    }

    pub fn mode(&self) -> ArchMode {
        self.mode
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn decoder_name(&self) -> &str {
        self.decoder.name()
    }

    pub fn assembler_name(&self) -> &str {
        self.assembler.name()
    }

    /// Instructions of the current session.
    pub fn listing(&self) -> &[Instruction] {
        &self.listing
    }

    pub fn session_base(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.base)
    }

    /// Mode used by the most recent successful patch.
    pub fn last_patch_mode(&self) -> Option<ArchMode> {
        self.last_patch_mode
    }

    /// Decode `window` at `base` with the configured limit.
    pub fn disassemble(&self, window: &[u8], base: u64) -> Vec<Instruction> {
        self.disassemble_with_limit(window, base, self.limit)
    }

    /// Decode at most `limit` instructions. A decoder failure ends the
    /// listing; what was decoded before is kept.
    pub fn disassemble_with_limit(&self, window: &[u8], base: u64, limit: usize) -> Vec<Instruction> {
        if window.is_empty() || limit == 0 {
            return Vec::new();
        }
        match self.decoder.decode(window, base, limit) {
            Ok(mut insns) => {
                insns.truncate(limit);
                insns
            }
            Err(e) => {
                warn!(
                    base = format_args!("{:#x}", base),
                    mode = %self.mode,
                    error = %e,
                    "Decoder failed, listing truncated"
                );
                Vec::new()
            }
        }
    }

    /// Start a session at `offset` into the view's range, listing from there
    /// to the range's resolved tail.
    pub fn open_at<R: RemoteMemory>(
        &mut self,
        view: &MemoryViewEngine<R>,
        offset: usize,
    ) -> Result<&[Instruction]> {
        let bytes = view.range().slice_from(offset)?;
        let base = view.range().base() + offset as u64;
        Ok(self.open_window(base, bytes))
    }

    /// Start a session over bytes already at hand.
    pub fn open_window(&mut self, base: u64, bytes: Bytes) -> &[Instruction] {
        self.session = Some(Session { base, bytes });
        self.relist();
        &self.listing
    }

    fn relist(&mut self) {
        self.listing = match &self.session {
            Some(s) => self.disassemble(&s.bytes, s.base),
            None => Vec::new(),
        };
        debug!(
            count = self.listing.len(),
            mode = %self.mode,
            "Disassembled session window"
        );
    }

    /// Switch to `mode` and re-decode the session. On failure the current
    /// decoder stays in place.
    pub fn set_mode(&mut self, mode: ArchMode) -> Result<()> {
        if mode == self.mode {
            return Ok(());
        }
        self.decoder = self.provider.decoder_for(mode)?;
        self.mode = mode;
        self.relist();
        Ok(())
    }

    /// Toggle ARM and THUMB; ARM64 has a single mode and is left alone.
    pub fn swap_mode(&mut self) -> Result<ArchMode> {
        if self.mode.is_swappable() {
            self.set_mode(self.mode.toggled())?;
        }
        Ok(self.mode)
    }

    /// Encode `text` for `mode`, write exactly the encoded bytes at `address`
    /// through the view, then re-list the session.
    ///
    /// Nothing is written when encoding fails. Once the write lands the call
    /// succeeds; if the re-read fails the previous listing is kept.
    pub fn patch_instruction<R: RemoteMemory>(
        &mut self,
        view: &mut MemoryViewEngine<R>,
        address: u64,
        text: &str,
        mode: ArchMode,
    ) -> Result<&[Instruction]> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EncodeError::Syntax("empty instruction text".to_string()).into());
        }
        let encoded = self.assembler.assemble(mode, text, address)?;
        if encoded.is_empty() {
            return Err(EncodeError::Empty(text.to_string()).into());
        }
        view.write_bytes(address, &encoded)?;
        self.last_patch_mode = Some(mode);
        debug!(
            address = format_args!("{:#x}", address),
            len = encoded.len(),
            %mode,
            "Patched instruction"
        );
        if let Err(e) = self.reload(view) {
            warn!(
                address = format_args!("{:#x}", address),
                error = %e,
                "Re-read after patch failed, listing kept"
            );
        }
        Ok(&self.listing)
    }

    /// Patch the instruction shown at `row` of the listing.
    pub fn patch_row<R: RemoteMemory>(
        &mut self,
        view: &mut MemoryViewEngine<R>,
        row: usize,
        text: &str,
        mode: ArchMode,
    ) -> Result<&[Instruction]> {
        let address = self
            .listing
            .get(row)
            .map(|insn| insn.address)
            .ok_or(MemViewError::OutOfBounds {
                offset: row as u64,
                len: 1,
                tail: self.listing.len() as u64,
            })?;
        self.patch_instruction(view, address, text, mode)
    }

    /// Text to pre-fill the patch editor with for `row`.
    pub fn prefill(&self, row: usize) -> Option<String> {
        self.listing.get(row).map(Instruction::text)
    }

    /// Re-read the session window after a write.
    fn reload<R: RemoteMemory>(&mut self, view: &MemoryViewEngine<R>) -> Result<()> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        let base = session.base;
        let len = session.bytes.len();
        let fresh = match view.bytes_from(base) {
            Ok(bytes) if !view.range().is_stale() => bytes,
            _ => {
                let data = view.remote().read_bytes(base, len).map_err(|source| {
                    MemViewError::RemoteReadFailure {
                        address: base,
                        len,
                        source,
                    }
                })?;
                Bytes::from(data)
            }
        };
        self.session = Some(Session { base, bytes: fresh });
        self.relist();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::disassembler::DisassemblerResult;

    /// Decodes each 4-byte word as `word <hex>` and fails on 0xffffffff.
    struct WordDecoder(ArchMode);

    impl Decoder for WordDecoder {
        fn decode(
            &self,
            bytes: &[u8],
            address: u64,
            max_instructions: usize,
        ) -> DisassemblerResult<Vec<Instruction>> {
            Ok(bytes
                .chunks_exact(4)
                .take_while(|w| *w != [0xff; 4])
                .take(max_instructions)
                .enumerate()
                .map(|(i, w)| {
                    Instruction::new(
                        address + 4 * i as u64,
                        "word".to_string(),
                        hex::encode(w),
                        w.to_vec(),
                    )
                })
                .collect())
        }
        fn mode(&self) -> ArchMode {
            self.0
        }
    }

    struct WordProvider;

    impl DecoderProvider for WordProvider {
        fn decoder_for(&self, mode: ArchMode) -> DisassemblerResult<Box<dyn Decoder>> {
            match mode {
                ArchMode::Arm32Thumb => Err(DisassemblerError::UnsupportedMode(mode)),
                _ => Ok(Box::new(WordDecoder(mode))),
            }
        }
    }

    fn engine(mode: ArchMode, limit: usize) -> DisassemblyEngine {
        DisassemblyEngine::with_provider(
            mode,
            Box::new(WordProvider),
            Box::new(UnavailableAssembler),
            &DisasmConfig {
                instruction_limit: limit,
            },
        )
        .unwrap()
    }

    #[test]
    fn listing_is_bounded_and_stops_at_undecodable() {
        let e = engine(ArchMode::Arm64, 3);
        let window: Vec<u8> = (0..40).collect();
        assert_eq!(e.disassemble(&window, 0x100).len(), 3);
        let mut stop = vec![0u8; 8];
        stop.extend([0xff; 4]);
        stop.extend([0u8; 4]);
        assert_eq!(e.disassemble_with_limit(&stop, 0, 100).len(), 2);
        assert!(e.disassemble(&[], 0).is_empty());
    }

    #[test]
    fn failed_swap_keeps_decoder() {
        let mut e = engine(ArchMode::Arm32Arm, 16);
        e.open_window(0x2000, Bytes::from_static(&[1, 2, 3, 4]));
        assert!(matches!(
            e.swap_mode(),
            Err(MemViewError::DecodeFailure(DisassemblerError::UnsupportedMode(
                ArchMode::Arm32Thumb
            )))
        ));
        assert_eq!(e.mode(), ArchMode::Arm32Arm);
        assert_eq!(e.listing().len(), 1);
    }

    #[test]
    fn arm64_swap_is_noop() {
        let mut e = engine(ArchMode::Arm64, 16);
        assert_eq!(e.swap_mode().unwrap(), ArchMode::Arm64);
    }

    #[test]
    fn prefill_uses_listing_text() {
        let mut e = engine(ArchMode::Arm64, 16);
        e.open_window(0x2000, Bytes::from_static(&[0xaa, 0xbb, 0xcc, 0xdd]));
        assert_eq!(e.prefill(0).as_deref(), Some("word aabbccdd"));
        assert_eq!(e.prefill(1), None);
        assert_eq!(e.session_base(), Some(0x2000));
    }

    #[test]
    fn unknown_target_is_rejected() {
        let err = DisassemblyEngine::for_target(
            "mips",
            Box::new(UnavailableAssembler),
            &DisasmConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, MemViewError::DecodeFailure(_)));
    }
}
