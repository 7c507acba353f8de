//! Low-level field decoders shared by the locator, the central directory
//! parser and the local header reader.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, ZipError};

/// Lower 32 code points of CP437 as rendered by DOS (graphic glyphs, not
/// control characters). 0x00 stays NUL.
#[rustfmt::skip]
const CP437_LOW: [char; 32] = [
    '\u{0000}', '☺', '☻', '♥', '♦', '♣', '♠', '•',
    '◘', '○', '◙', '♂', '♀', '♪', '♫', '☼',
    '►', '◄', '↕', '‼', '¶', '§', '▬', '↨',
    '↑', '↓', '→', '←', '∟', '↔', '▲', '▼',
];

/// Upper half of CP437 (0x80..=0xFF).
#[rustfmt::skip]
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç',
    'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù',
    'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º',
    '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖',
    '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟',
    '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫',
    '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ',
    'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈',
    '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{00A0}',
];

fn cp437_char(byte: u8) -> char {
    match byte {
        0x00..=0x1F => CP437_LOW[byte as usize],
        0x7F => '⌂',
        0x20..=0x7E => byte as char,
        _ => CP437_HIGH[(byte - 0x80) as usize],
    }
}

/// Decode a CP437 byte string.
pub fn decode_cp437(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| cp437_char(b)).collect()
}

/// Decode a name or comment field. UTF-8 is decoded lossily so that a
/// malformed sequence never aborts the walk.
pub fn decode_string(bytes: &[u8], is_utf8: bool) -> String {
    if is_utf8 {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        decode_cp437(bytes)
    }
}

/// Read a 64-bit little-endian value as two 32-bit halves.
pub fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    let lower = LittleEndian::read_u32(&data[offset..offset + 4]) as u64;
    let upper = LittleEndian::read_u32(&data[offset + 4..offset + 8]) as u64;
    (upper << 32) | lower
}

/// Apply the lenient backslash rule: unless strict names are requested,
/// Windows separators become forward slashes.
pub fn normalize_file_name(name: String, strict: bool) -> String {
    if strict || !name.contains('\\') {
        name
    } else {
        name.replace('\\', "/")
    }
}

/// Reject names that would escape an extraction root.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.contains('\\') {
        return Err(ZipError::InvalidCharacters(name.to_string()));
    }
    let bytes = name.as_bytes();
    let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if has_drive || name.starts_with('/') {
        return Err(ZipError::AbsolutePath(name.to_string()));
    }
    if name.split('/').any(|segment| segment == "..") {
        return Err(ZipError::InvalidRelativePath(name.to_string()));
    }
    Ok(())
}

/// Calendar fields of an MS-DOS timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DosDateTime {
    pub fn from_dos(date: u16, time: u16) -> Self {
        Self {
            year: ((date >> 9) & 0x7F) + 1980,
            month: ((date >> 5) & 0x0F) as u8,
            day: (date & 0x1F) as u8,
            hour: ((time >> 11) & 0x1F) as u8,
            minute: ((time >> 5) & 0x3F) as u8,
            // two-second resolution
            second: ((time & 0x1F) * 2) as u8,
        }
    }
}

impl std::fmt::Display for DosDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}
