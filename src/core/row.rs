//! Grid rows: 16-byte slices of a range with their address and ASCII text.
//!
//! Rows are derived from the range buffer on demand and never stored apart
//! from the row cache. The hex helpers here format and parse the byte text
//! used by edit prompts.

use serde::{Deserialize, Serialize};

use crate::error::{MemViewError, Result};

/// Bytes per grid row.
pub const ROW_WIDTH: usize = 16;

/// One resolved row of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Row index within the range
    pub index: usize,
    /// Address of the first byte
    pub address: u64,
    /// Up to `ROW_WIDTH` bytes; fewer only for the last resolved row
    pub bytes: Vec<u8>,
    /// Printable rendering of `bytes`
    pub ascii: String,
}

impl Row {
    /// Resolve row `index` of a range starting at `base`, `size` bytes long,
    /// of which `data` holds the resolved prefix.
    ///
    /// Fails with `OutOfBounds` when the row starts beyond the resolved data.
    pub fn resolve(index: usize, base: u64, size: usize, data: &[u8]) -> Result<Row> {
        let offset = index.saturating_mul(ROW_WIDTH);
        let limit = size.min(data.len());
        if offset >= limit {
            return Err(MemViewError::OutOfBounds {
                offset: offset as u64,
                len: ROW_WIDTH,
                tail: limit as u64,
            });
        }
        let end = (offset + ROW_WIDTH).min(limit);
        let bytes = data[offset..end].to_vec();
        let ascii = ascii_preview(&bytes);
        Ok(Row {
            index,
            address: base + offset as u64,
            bytes,
            ascii,
        })
    }

    /// Address of column `col`, if the row holds that byte.
    pub fn byte_address(&self, col: usize) -> Option<u64> {
        (col < self.bytes.len()).then(|| self.address + col as u64)
    }

    pub fn hex(&self) -> String {
        format_hex(&self.bytes)
    }

    /// True when the row holds fewer than `ROW_WIDTH` bytes.
    pub fn is_partial(&self) -> bool {
        self.bytes.len() < ROW_WIDTH
    }
}

/// Number of rows needed to cover `size` bytes.
pub fn row_count(size: usize) -> usize {
    size.div_ceil(ROW_WIDTH)
}

/// Render bytes as printable ASCII, '.' for everything else.
pub fn ascii_preview(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if (0x20..0x7f).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Format bytes as space separated lowercase hex pairs ("de ad be ef").
pub fn format_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&hex::encode([*b]));
    }
    out
}

/// Parse hex byte text, ignoring whitespace ("90 90", "9090", "0x90 0x90").
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .split_whitespace()
        .map(|tok| {
            tok.strip_prefix("0x")
                .or_else(|| tok.strip_prefix("0X"))
                .unwrap_or(tok)
        })
        .collect();
    if digits.is_empty() {
        return Err(MemViewError::InvalidHex("no bytes given".to_string()));
    }
    hex::decode(&digits).map_err(|e| MemViewError::InvalidHex(format!("'{}': {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_full_row() {
        let data: Vec<u8> = (0u8..64).collect();
        let row = Row::resolve(1, 0x1000, data.len(), &data).unwrap();
        assert_eq!(row.address, 0x1010);
        assert_eq!(row.bytes, (16u8..32).collect::<Vec<_>>());
        assert!(!row.is_partial());
        assert_eq!(row.byte_address(15), Some(0x101f));
        assert_eq!(row.byte_address(16), None);
    }

    #[test]
    fn resolve_tail_row_is_short() {
        let data = vec![0x41u8; 20];
        let row = Row::resolve(1, 0x2000, 20, &data).unwrap();
        assert_eq!(row.bytes.len(), 4);
        assert_eq!(row.ascii, "AAAA");
        assert!(row.is_partial());
    }

    #[test]
    fn resolve_beyond_resolved_data_fails() {
        // 48 bytes claimed, only 32 resolved
        let data = vec![0u8; 32];
        let err = Row::resolve(2, 0x1000, 48, &data).unwrap_err();
        assert!(matches!(err, MemViewError::OutOfBounds { offset: 32, tail: 32, .. }));
    }

    #[test]
    fn ascii_preview_masks_unprintable() {
        assert_eq!(ascii_preview(b"Hi \x00\x7f~\n"), "Hi ..~.");
    }

    #[test]
    fn row_count_rounds_up() {
        assert_eq!(row_count(0), 0);
        assert_eq!(row_count(16), 1);
        assert_eq!(row_count(17), 2);
        assert_eq!(row_count(256), 16);
    }

    #[test]
    fn hex_format_and_parse() {
        assert_eq!(format_hex(&[0xde, 0xad, 0x01]), "de ad 01");
        assert_eq!(parse_hex("de ad 01").unwrap(), vec![0xde, 0xad, 0x01]);
        assert_eq!(parse_hex("9090").unwrap(), vec![0x90, 0x90]);
        assert_eq!(parse_hex("0x90 0X91").unwrap(), vec![0x90, 0x91]);
        assert!(matches!(parse_hex("   "), Err(MemViewError::InvalidHex(_))));
        assert!(matches!(parse_hex("9"), Err(MemViewError::InvalidHex(_))));
        assert!(matches!(parse_hex("zz"), Err(MemViewError::InvalidHex(_))));
    }
}
