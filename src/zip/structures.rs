use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;

use crate::error::{Result, ZipError};

use super::decode::DosDateTime;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Sentinel stored in 32-bit size/offset fields when the real value lives
/// in the ZIP64 extended information extra field.
pub const ZIP64_SENTINEL_U32: u32 = 0xFFFF_FFFF;
/// Sentinel stored in 16-bit entry counts of ZIP64 archives.
pub const ZIP64_SENTINEL_U16: u16 = 0xFFFF;

/// End of Central Directory (EOCD) - 22 bytes plus comment
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0605_4b50;
    pub const SIZE: usize = 22;
    /// The comment length field is two bytes wide.
    pub const MAX_COMMENT_SIZE: usize = 0xFFFF;

    /// Parse the fixed part of a record whose signature was already matched.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(ZipError::UnexpectedEof);
        }

        let mut cursor = Cursor::new(&data[4..Self::SIZE]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Only the entry count and the directory offset decide whether the
    /// ZIP64 records must be consulted.
    pub fn is_zip64(&self) -> bool {
        self.total_entries == ZIP64_SENTINEL_U16 || self.cd_offset == ZIP64_SENTINEL_U32
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone)]
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: u32 = 0x0706_4b50;
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        if cursor.read_u32::<LittleEndian>()? != Self::SIGNATURE {
            return Err(ZipError::InvalidZip64LocatorSignature);
        }

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
#[derive(Debug, Clone)]
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: u32 = 0x0606_4b50;
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        if cursor.read_u32::<LittleEndian>()? != Self::SIGNATURE {
            return Err(ZipError::InvalidZip64EocdrSignature);
        }

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: u32 = 0x0201_4b50;
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: u32 = 0x0403_4b50;
pub const LFH_SIZE: usize = 30;

/// Extra field holding 64-bit sizes and offsets.
pub const ZIP64_EXTRA_FIELD_ID: u16 = 0x0001;
/// Info-ZIP Unicode Path extra field.
pub const UNICODE_PATH_EXTRA_FIELD_ID: u16 = 0x7075;

/// General purpose flag bits.
pub const FLAG_ENCRYPTED: u16 = 0x0001;
pub const FLAG_STRONG_ENCRYPTION: u16 = 0x0040;
pub const FLAG_UTF8: u16 = 0x0800;

/// Traditional PKWARE encryption prefixes file data with this many bytes.
pub const TRADITIONAL_ENCRYPTION_HEADER_SIZE: u64 = 12;

/// A name or comment field: decoded text, or the raw bytes when string
/// decoding is disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZipString {
    Decoded(String),
    Raw(Vec<u8>),
}

impl ZipString {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ZipString::Decoded(s) => s.as_bytes(),
            ZipString::Raw(b) => b,
        }
    }

    /// The decoded text, if decoding was enabled.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ZipString::Decoded(s) => Some(s),
            ZipString::Raw(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl fmt::Display for ZipString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZipString::Decoded(s) => f.write_str(s),
            ZipString::Raw(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

impl PartialEq<str> for ZipString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for ZipString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// One `(id, data)` triple from an extra field block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraField {
    pub id: u16,
    pub data: Vec<u8>,
}

/// Parsed central directory entry.
///
/// Immutable once emitted by the archive. Content is read back through
/// [`Archive::open_entry`](super::Archive::open_entry).
#[derive(Debug, Clone)]
pub struct Entry {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub lfh_offset: u64,
    pub file_name: ZipString,
    pub file_comment: ZipString,
    pub extra_fields: Vec<ExtraField>,
}

impl Entry {
    /// Directory entries end with '/'
    pub fn is_directory(&self) -> bool {
        self.file_name.as_bytes().ends_with(b"/")
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.compression_method == CompressionMethod::Deflate
    }

    pub fn is_utf8(&self) -> bool {
        self.flags & FLAG_UTF8 != 0
    }

    pub fn extra_field(&self, id: u16) -> Option<&ExtraField> {
        self.extra_fields.iter().find(|f| f.id == id)
    }

    pub fn last_modified(&self) -> DosDateTime {
        DosDateTime::from_dos(self.last_mod_date, self.last_mod_time)
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let dt = self.last_modified();
        (dt.year, dt.month, dt.day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let dt = self.last_modified();
        (dt.hour, dt.minute, dt.second)
    }
}

/// What [`Archive::next_entry`](super::Archive::next_entry) yields: the bare
/// descriptor, or the descriptor with its content already read when the
/// archive was opened with `with_content`.
#[derive(Debug, Clone)]
pub enum ArchiveEntry {
    Ref(Entry),
    WithContent { entry: Entry, content: Vec<u8> },
}

impl ArchiveEntry {
    pub fn entry(&self) -> &Entry {
        match self {
            ArchiveEntry::Ref(entry) => entry,
            ArchiveEntry::WithContent { entry, .. } => entry,
        }
    }

    pub fn content(&self) -> Option<&[u8]> {
        match self {
            ArchiveEntry::Ref(_) => None,
            ArchiveEntry::WithContent { content, .. } => Some(content),
        }
    }

    pub fn into_entry(self) -> Entry {
        match self {
            ArchiveEntry::Ref(entry) => entry,
            ArchiveEntry::WithContent { entry, .. } => entry,
        }
    }
}
