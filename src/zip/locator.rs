//! End of central directory discovery.
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) in the file's tail
//! 2. If ZIP64 sentinels are present, follow the ZIP64 locator to the
//!    ZIP64 EOCD for the real entry count and directory offset
//!
//! Only the tail is fetched, which keeps this cheap for HTTP sources.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, ZipError};
use crate::io::{ReadAt, SharedSource};

use super::decode::decode_cp437;
use super::structures::*;

/// Largest archive accepted. Offsets above 2^53 are not representable by
/// every consumer of the entry metadata, so they are refused up front.
pub const MAX_ARCHIVE_SIZE: u64 = (1 << 53) - 1;

/// What the archive handle needs from the trailer records.
#[derive(Debug, Clone)]
pub struct ArchiveLocation {
    pub cd_offset: u64,
    pub entry_count: u64,
    pub comment: ZipString,
    pub eocd_offset: u64,
    pub zip64: bool,
}

/// Find and parse the End of Central Directory record.
///
/// The record is followed by a comment of up to 65535 bytes, so the last
/// `22 + 65535` bytes are scanned for the signature, starting at the
/// highest position a fixed record fits and moving towards the start of
/// the file. The first match wins; its comment length must then account
/// for every remaining byte.
///
/// Returns the record, its absolute offset and the raw comment bytes.
pub async fn find_eocd<R: ReadAt>(
    source: &SharedSource<R>,
    total_size: u64,
) -> Result<(EndOfCentralDirectory, u64, Vec<u8>)> {
    let search_size = ((EndOfCentralDirectory::SIZE + EndOfCentralDirectory::MAX_COMMENT_SIZE)
        as u64)
        .min(total_size);
    let search_start = total_size - search_size;

    let mut buf = vec![0u8; search_size as usize];
    source.read_exact_at(&mut buf, search_start).await?;

    let Some(last) = buf.len().checked_sub(EndOfCentralDirectory::SIZE) else {
        return Err(ZipError::EocdrNotFound);
    };

    for i in (0..=last).rev() {
        if LittleEndian::read_u32(&buf[i..i + 4]) != EndOfCentralDirectory::SIGNATURE {
            continue;
        }

        let eocd = EndOfCentralDirectory::from_bytes(&buf[i..])?;
        if eocd.disk_number != 0 {
            return Err(ZipError::MultiDisk(eocd.disk_number));
        }

        let expected = buf.len() - i - EndOfCentralDirectory::SIZE;
        if eocd.comment_len as usize != expected {
            return Err(ZipError::InvalidCommentLength {
                expected,
                found: eocd.comment_len,
            });
        }

        let offset = search_start + i as u64;
        log::debug!(
            "end of central directory at {offset}: {} entries, directory at {}",
            eocd.total_entries,
            eocd.cd_offset
        );
        let comment = buf[i + EndOfCentralDirectory::SIZE..].to_vec();
        return Ok((eocd, offset, comment));
    }

    Err(ZipError::EocdrNotFound)
}

/// Read the ZIP64 End of Central Directory record.
///
/// The ZIP64 locator sits immediately before the regular EOCD and points
/// at the ZIP64 record.
pub async fn read_zip64_eocd<R: ReadAt>(
    source: &SharedSource<R>,
    eocd_offset: u64,
) -> Result<Zip64EOCD> {
    let locator_offset = eocd_offset
        .checked_sub(Zip64EOCDLocator::SIZE as u64)
        .ok_or(ZipError::InvalidZip64LocatorSignature)?;
    let mut locator_buf = [0u8; Zip64EOCDLocator::SIZE];
    source.read_exact_at(&mut locator_buf, locator_offset).await?;
    let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

    let mut eocd64_buf = [0u8; Zip64EOCD::MIN_SIZE];
    source
        .read_exact_at(&mut eocd64_buf, locator.eocd64_offset)
        .await?;
    let eocd64 = Zip64EOCD::from_bytes(&eocd64_buf)?;
    log::debug!(
        "zip64 end of central directory at {}: {} entries, directory at {}",
        locator.eocd64_offset,
        eocd64.total_entries,
        eocd64.cd_offset
    );
    Ok(eocd64)
}

/// Locate the central directory of an archive of `total_size` bytes.
pub async fn locate<R: ReadAt>(
    source: &SharedSource<R>,
    total_size: u64,
    decode_strings: bool,
) -> Result<ArchiveLocation> {
    if total_size > MAX_ARCHIVE_SIZE {
        return Err(ZipError::TooLarge(total_size));
    }

    let (eocd, eocd_offset, comment) = find_eocd(source, total_size).await?;

    // the archive comment is always CP437
    let comment = if decode_strings {
        ZipString::Decoded(decode_cp437(&comment))
    } else {
        ZipString::Raw(comment)
    };

    if !eocd.is_zip64() {
        return Ok(ArchiveLocation {
            cd_offset: eocd.cd_offset as u64,
            entry_count: eocd.total_entries as u64,
            comment,
            eocd_offset,
            zip64: false,
        });
    }

    let eocd64 = read_zip64_eocd(source, eocd_offset).await?;
    Ok(ArchiveLocation {
        cd_offset: eocd64.cd_offset,
        entry_count: eocd64.total_entries,
        comment,
        eocd_offset,
        zip64: true,
    })
}
