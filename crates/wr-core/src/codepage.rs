//! Windows-1252, the code page used by the timing consoles and meet software.
//!
//! Decoding is strict: the five bytes that code page 1252 leaves undefined are
//! reported instead of being replaced.

use thiserror::Error;

/// Code points for bytes `0x80..=0x9F`. `None` marks an undefined byte.
const HIGH_CONTROL_RANGE: [Option<char>; 32] = [
    Some('\u{20AC}'), // 0x80 euro sign
    None,             // 0x81
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,             // 0x8D
    Some('\u{017D}'),
    None,             // 0x8F
    None,             // 0x90
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,             // 0x9D
    Some('\u{017E}'),
    Some('\u{0178}'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("byte 0x{byte:02X} at offset {offset} is undefined in code page 1252")]
pub struct DecodeError {
    pub offset: usize,
    pub byte: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("character {ch:?} cannot be represented in code page 1252")]
pub struct EncodeError {
    pub ch: char,
}

/// Decodes a Windows-1252 byte sequence.
pub fn decode(bytes: &[u8]) -> Result<String, DecodeError> {
    let mut text = String::with_capacity(bytes.len());
    for (offset, &byte) in bytes.iter().enumerate() {
        let ch = match byte {
            0x80..=0x9F => HIGH_CONTROL_RANGE[usize::from(byte - 0x80)]
                .ok_or(DecodeError { offset, byte })?,
            _ => char::from(byte),
        };
        text.push(ch);
    }
    Ok(text)
}

/// Encodes text as Windows-1252.
pub fn encode(text: &str) -> Result<Vec<u8>, EncodeError> {
    text.chars()
        .map(|ch| match u32::from(ch) {
            code @ (0..=0x7F | 0xA0..=0xFF) => u8::try_from(code).map_err(|_| EncodeError { ch }),
            _ => HIGH_CONTROL_RANGE
                .iter()
                .position(|&mapped| mapped == Some(ch))
                .and_then(|index| u8::try_from(index).ok())
                .map(|index| 0x80 + index)
                .ok_or(EncodeError { ch }),
        })
        .collect()
}
