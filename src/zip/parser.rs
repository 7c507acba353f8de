//! Central directory record parsing.
//!
//! A record is a fixed 46-byte header followed by the file name, the extra
//! field block and the file comment. The archive reads the two parts with
//! separate ranged reads; the functions here turn those bytes into an
//! [`Entry`] and apply every per-entry rule: ZIP64 resolution, the Unicode
//! Path override, stored size checks and file name validation.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{Result, ZipError};

use super::decode::{decode_string, normalize_file_name, read_u64_le, validate_file_name};
use super::options::OpenOptions;
use super::structures::*;

/// Fixed part of a Central Directory File Header.
#[derive(Debug, Clone)]
pub struct CentralRecordHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number_start: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub lfh_offset: u32,
}

impl CentralRecordHeader {
    /// Parse and check the fixed header.
    pub fn from_bytes(data: &[u8; CDFH_MIN_SIZE]) -> Result<Self> {
        let mut cursor = Cursor::new(&data[..]);

        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != CDFH_SIGNATURE {
            return Err(ZipError::InvalidCentralDirectorySignature(signature));
        }

        let header = Self {
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            compression_method: cursor.read_u16::<LittleEndian>()?,
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
            file_comment_length: cursor.read_u16::<LittleEndian>()?,
            disk_number_start: cursor.read_u16::<LittleEndian>()?,
            internal_attributes: cursor.read_u16::<LittleEndian>()?,
            external_attributes: cursor.read_u32::<LittleEndian>()?,
            lfh_offset: cursor.read_u32::<LittleEndian>()?,
        };

        if header.flags & FLAG_STRONG_ENCRYPTION != 0 {
            return Err(ZipError::StrongEncryption);
        }

        Ok(header)
    }

    /// Length of the name + extra + comment block that follows.
    pub fn variable_length(&self) -> usize {
        self.file_name_length as usize
            + self.extra_field_length as usize
            + self.file_comment_length as usize
    }
}

/// Split an extra field block into `(id, data)` triples.
///
/// Trailing bytes too short to hold an id and a size are ignored.
pub fn parse_extra_fields(block: &[u8]) -> Result<Vec<ExtraField>> {
    let mut fields = Vec::new();
    let mut i = 0;

    while i + 4 <= block.len() {
        let id = LittleEndian::read_u16(&block[i..]);
        let size = LittleEndian::read_u16(&block[i + 2..]) as usize;
        let data_start = i + 4;
        let data_end = data_start + size;
        if data_end > block.len() {
            return Err(ZipError::ExtraFieldOverrun);
        }
        fields.push(ExtraField {
            id,
            data: block[data_start..data_end].to_vec(),
        });
        i = data_end;
    }

    Ok(fields)
}

/// 64-bit values that may be sentineled in the fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64Values {
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub lfh_offset: u64,
}

/// Replace `0xFFFFFFFF` sentinels with the values from the ZIP64 extended
/// information field. Values appear in a fixed order and only for the
/// fields that were sentineled.
pub fn resolve_zip64(header: &CentralRecordHeader, fields: &[ExtraField]) -> Result<Zip64Values> {
    let mut values = Zip64Values {
        uncompressed_size: header.uncompressed_size as u64,
        compressed_size: header.compressed_size as u64,
        lfh_offset: header.lfh_offset as u64,
    };

    let sentineled = [
        header.uncompressed_size == ZIP64_SENTINEL_U32,
        header.compressed_size == ZIP64_SENTINEL_U32,
        header.lfh_offset == ZIP64_SENTINEL_U32,
    ];
    if !sentineled.contains(&true) {
        return Ok(values);
    }

    let data = fields
        .iter()
        .find(|f| f.id == ZIP64_EXTRA_FIELD_ID)
        .map(|f| f.data.as_slice())
        .ok_or(ZipError::MissingZip64ExtraField)?;

    let targets: [(&mut u64, &'static str); 3] = [
        (&mut values.uncompressed_size, "uncompressed size"),
        (&mut values.compressed_size, "compressed size"),
        (&mut values.lfh_offset, "relative header offset"),
    ];

    let mut index = 0;
    for ((slot, what), needed) in targets.into_iter().zip(sentineled) {
        if !needed {
            continue;
        }
        if index + 8 > data.len() {
            return Err(ZipError::Zip64FieldMissing(what));
        }
        *slot = read_u64_le(data, index);
        index += 8;
    }

    Ok(values)
}

/// The name carried by a valid Info-ZIP Unicode Path field, if any.
///
/// The field is used only when its version is 1 and its CRC32 matches the
/// raw header name; anything else falls back to the header name.
pub fn unicode_path(fields: &[ExtraField], raw_name: &[u8]) -> Option<String> {
    for field in fields.iter().filter(|f| f.id == UNICODE_PATH_EXTRA_FIELD_ID) {
        let data = &field.data;
        if data.len() < 6 {
            continue;
        }
        if data[0] != 1 {
            log::warn!("ignoring unicode path extra field version {}", data[0]);
            continue;
        }
        let name_crc32 = LittleEndian::read_u32(&data[1..5]);
        if crc32fast::hash(raw_name) != name_crc32 {
            log::warn!("ignoring unicode path extra field with stale name checksum");
            continue;
        }
        return Some(String::from_utf8_lossy(&data[5..]).into_owned());
    }
    None
}

/// Build an entry from a checked fixed header and its variable block.
pub fn parse_entry(
    header: &CentralRecordHeader,
    variable: &[u8],
    options: &OpenOptions,
) -> Result<Entry> {
    let name_end = header.file_name_length as usize;
    let extra_end = name_end + header.extra_field_length as usize;
    let comment_end = extra_end + header.file_comment_length as usize;
    if variable.len() < comment_end {
        return Err(ZipError::UnexpectedEof);
    }

    let raw_name = &variable[..name_end];
    let raw_comment = &variable[extra_end..comment_end];
    let is_utf8 = header.flags & FLAG_UTF8 != 0;

    let extra_fields = parse_extra_fields(&variable[name_end..extra_end])?;
    let sizes = resolve_zip64(header, &extra_fields)?;

    let (file_name, file_comment) = if options.decode_strings {
        let name = unicode_path(&extra_fields, raw_name)
            .unwrap_or_else(|| decode_string(raw_name, is_utf8));
        let name = normalize_file_name(name, options.strict_file_names);
        (
            ZipString::Decoded(name),
            ZipString::Decoded(decode_string(raw_comment, is_utf8)),
        )
    } else {
        (
            ZipString::Raw(raw_name.to_vec()),
            ZipString::Raw(raw_comment.to_vec()),
        )
    };

    let entry = Entry {
        version_made_by: header.version_made_by,
        version_needed: header.version_needed,
        flags: header.flags,
        compression_method: CompressionMethod::from_u16(header.compression_method),
        last_mod_time: header.last_mod_time,
        last_mod_date: header.last_mod_date,
        crc32: header.crc32,
        compressed_size: sizes.compressed_size,
        uncompressed_size: sizes.uncompressed_size,
        internal_attributes: header.internal_attributes,
        external_attributes: header.external_attributes,
        lfh_offset: sizes.lfh_offset,
        file_name,
        file_comment,
        extra_fields,
    };

    if options.validate_entry_sizes && entry.compression_method == CompressionMethod::Stored {
        let expected = if entry.is_encrypted() {
            entry
                .uncompressed_size
                .checked_add(TRADITIONAL_ENCRYPTION_HEADER_SIZE)
        } else {
            Some(entry.uncompressed_size)
        };
        if expected != Some(entry.compressed_size) {
            return Err(ZipError::StoredSizeMismatch {
                compressed: entry.compressed_size,
                uncompressed: entry.uncompressed_size,
            });
        }
    }

    if let Some(name) = entry.file_name.as_str() {
        validate_file_name(name)?;
    }

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(uncompressed: u32, compressed: u32, offset: u32) -> CentralRecordHeader {
        CentralRecordHeader {
            version_made_by: 20,
            version_needed: 20,
            flags: 0,
            compression_method: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            crc32: 0,
            compressed_size: compressed,
            uncompressed_size: uncompressed,
            file_name_length: 0,
            extra_field_length: 0,
            file_comment_length: 0,
            disk_number_start: 0,
            internal_attributes: 0,
            external_attributes: 0,
            lfh_offset: offset,
        }
    }

    fn zip64_field(values: &[u64]) -> ExtraField {
        ExtraField {
            id: ZIP64_EXTRA_FIELD_ID,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    #[test]
    fn fixed_header_checks() {
        let mut data = [0u8; CDFH_MIN_SIZE];
        data[..4].copy_from_slice(&0x0101_4b50u32.to_le_bytes());
        assert_eq!(
            CentralRecordHeader::from_bytes(&data).unwrap_err().to_string(),
            "invalid central directory file header signature: 0x1014b50"
        );

        data[..4].copy_from_slice(&CDFH_SIGNATURE.to_le_bytes());
        data[8..10].copy_from_slice(&FLAG_STRONG_ENCRYPTION.to_le_bytes());
        assert!(matches!(
            CentralRecordHeader::from_bytes(&data),
            Err(ZipError::StrongEncryption)
        ));
    }

    #[test]
    fn extra_fields_split_and_overrun() {
        let block = [0x01, 0x00, 0x02, 0x00, 0xAA, 0xBB, 0x75, 0x70, 0x00, 0x00, 0xFF];
        let fields = parse_extra_fields(&block).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].data, vec![0xAA, 0xBB]);
        assert!(fields[1].data.is_empty());

        let overrun = [0x01, 0x00, 0x09, 0x00, 0xAA];
        assert!(matches!(
            parse_extra_fields(&overrun),
            Err(ZipError::ExtraFieldOverrun)
        ));
    }

    #[test]
    fn zip64_values_resolved_in_order() {
        let h = header(0xFFFF_FFFF, 10, 0xFFFF_FFFF);
        let values = resolve_zip64(&h, &[zip64_field(&[5_000_000_000, 6_000_000_000])]).unwrap();
        assert_eq!(values.uncompressed_size, 5_000_000_000);
        assert_eq!(values.compressed_size, 10);
        assert_eq!(values.lfh_offset, 6_000_000_000);
    }

    #[test]
    fn zip64_missing_pieces() {
        let h = header(0xFFFF_FFFF, 0xFFFF_FFFF, 0xFFFF_FFFF);
        assert!(matches!(
            resolve_zip64(&h, &[]),
            Err(ZipError::MissingZip64ExtraField)
        ));
        for (values, what) in [
            (&[][..], "uncompressed size"),
            (&[1][..], "compressed size"),
            (&[1, 2][..], "relative header offset"),
        ] {
            let err = resolve_zip64(&h, &[zip64_field(values)]).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("zip64 extended information extra field does not include {what}")
            );
        }
    }

    #[test]
    fn unicode_path_requires_matching_crc() {
        let raw = b"????.txt";
        let mut data = vec![1];
        data.extend_from_slice(&crc32fast::hash(raw).to_le_bytes());
        data.extend_from_slice("七个房间.txt".as_bytes());
        let good = ExtraField {
            id: UNICODE_PATH_EXTRA_FIELD_ID,
            data: data.clone(),
        };
        assert_eq!(
            unicode_path(std::slice::from_ref(&good), raw).as_deref(),
            Some("七个房间.txt")
        );

        assert_eq!(unicode_path(&[good.clone()], b"other.txt"), None);

        let mut old_version = good;
        old_version.data[0] = 2;
        assert_eq!(unicode_path(&[old_version], raw), None);
    }

    #[test]
    fn stored_size_mismatch() {
        let mut h = header(5, 2147483647, 0);
        h.file_name_length = 1;
        let err = parse_entry(&h, b"a", &OpenOptions::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "compressed/uncompressed size mismatch for stored file: 2147483647 != 5"
        );
        let entry = parse_entry(&h, b"a", &OpenOptions::default().validate_entry_sizes(false));
        assert!(entry.is_ok());
    }

    #[test]
    fn encrypted_stored_entries_carry_header_bytes() {
        let mut h = header(5, 17, 0);
        h.flags = FLAG_ENCRYPTED;
        h.file_name_length = 1;
        assert!(parse_entry(&h, b"a", &OpenOptions::default()).is_ok());
    }

    #[test]
    fn encrypted_stored_size_near_u64_max() {
        let mut h = header(0xFFFF_FFFF, 0xFFFF_FFFF, 0);
        h.flags = FLAG_ENCRYPTED;
        h.file_name_length = 1;
        h.extra_field_length = 20;
        let mut variable = b"a".to_vec();
        variable.extend_from_slice(&ZIP64_EXTRA_FIELD_ID.to_le_bytes());
        variable.extend_from_slice(&16u16.to_le_bytes());
        variable.extend_from_slice(&u64::MAX.to_le_bytes());
        variable.extend_from_slice(&u64::MAX.to_le_bytes());

        let err = parse_entry(&h, &variable, &OpenOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ZipError::StoredSizeMismatch {
                compressed: u64::MAX,
                uncompressed: u64::MAX,
            }
        ));
    }

    #[test]
    fn names_are_normalized_then_validated() {
        let mut h = header(0, 0, 0);
        h.file_name_length = 5;
        let entry = parse_entry(&h, b"a\\txt", &OpenOptions::default()).unwrap();
        assert_eq!(entry.file_name, "a/txt");

        let strict = OpenOptions::default().strict_file_names(true);
        assert!(matches!(
            parse_entry(&h, b"a\\txt", &strict),
            Err(ZipError::InvalidCharacters(_))
        ));

        let raw = OpenOptions::default().decode_strings(false);
        let entry = parse_entry(&h, b"a\\txt", &raw).unwrap();
        assert_eq!(entry.file_name, ZipString::Raw(b"a\\txt".to_vec()));
    }
}
