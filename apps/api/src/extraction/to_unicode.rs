//! Minimal ToUnicode CMap reader.
//!
//! Fonts embedded by word processors usually encode glyphs as 2-byte CIDs
//! (Identity-H), so the raw string bytes are meaningless without the font's
//! ToUnicode map. Only `bfchar` and `bfrange` sections are read; that covers
//! what resume-producing tools emit.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static BFCHAR_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap());
static BFRANGE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap());
static HEX_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap());
static RANGE_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(<[0-9A-Fa-f]*>|\[[^\]]*\])").unwrap()
});
static HEX_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([0-9A-Fa-f]*)>").unwrap());

/// Ranges wider than this are almost certainly corrupt; they are skipped.
const MAX_RANGE_SPAN: u32 = 0xFFFF;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicodeMap {
    /// Source code width in bytes (1 or 2), taken from the map's entries.
    code_width: usize,
    map: HashMap<u32, String>,
}

impl ToUnicodeMap {
    /// Parses the decompressed CMap stream. Returns `None` when it holds no mappings.
    pub fn parse(cmap: &[u8]) -> Option<Self> {
        let source = String::from_utf8_lossy(cmap);
        let mut result = ToUnicodeMap {
            code_width: 1,
            map: HashMap::new(),
        };

        for block in BFCHAR_BLOCK.captures_iter(&source) {
            for pair in HEX_PAIR.captures_iter(&block[1]) {
                let Some(code) = parse_hex_code(&pair[1]) else {
                    continue;
                };
                result.note_width(&pair[1]);
                result.map.insert(code, decode_utf16_hex(&pair[2]));
            }
        }

        for block in BFRANGE_BLOCK.captures_iter(&source) {
            for entry in RANGE_ENTRY.captures_iter(&block[1]) {
                let (Some(lo), Some(hi)) = (parse_hex_code(&entry[1]), parse_hex_code(&entry[2]))
                else {
                    continue;
                };
                if hi < lo || hi - lo > MAX_RANGE_SPAN {
                    continue;
                }
                result.note_width(&entry[1]);

                let target = &entry[3];
                if target.starts_with('[') {
                    for (offset, token) in HEX_TOKEN.captures_iter(target).enumerate() {
                        let Some(code) = lo.checked_add(offset as u32).filter(|c| *c <= hi)
                        else {
                            break;
                        };
                        result.map.insert(code, decode_utf16_hex(&token[1]));
                    }
                } else {
                    let base_hex = target.trim_start_matches('<').trim_end_matches('>');
                    let base = utf16_units(base_hex);
                    for code in lo..=hi {
                        let mut units = base.clone();
                        if let Some(last) = units.last_mut() {
                            *last = last.wrapping_add((code - lo) as u16);
                        }
                        result.map.insert(code, String::from_utf16_lossy(&units));
                    }
                }
            }
        }

        if result.map.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    fn note_width(&mut self, hex: &str) {
        let width = hex.len().div_ceil(2).clamp(1, 4);
        self.code_width = self.code_width.max(width);
    }

    /// Decodes a string operand. Unmapped codes are dropped.
    pub fn decode(&self, bytes: &[u8]) -> String {
        bytes
            .chunks(self.code_width)
            .filter_map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                self.map.get(&code).map(String::as_str)
            })
            .collect()
    }
}

fn parse_hex_code(hex: &str) -> Option<u32> {
    if hex.is_empty() || hex.len() > 8 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

fn utf16_units(hex: &str) -> Vec<u16> {
    hex.as_bytes()
        .chunks(4)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .filter_map(|s| u16::from_str_radix(s, 16).ok())
        .collect()
}

fn decode_utf16_hex(hex: &str) -> String {
    String::from_utf16_lossy(&utf16_units(hex))
}
