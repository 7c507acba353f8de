//! In-memory ZIP writer for building test archives, including broken ones.
#![allow(dead_code)]

use std::io::Write;

use flate2::Compression;
use flate2::write::DeflateEncoder;

pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;
pub const SENTINEL: u32 = 0xFFFF_FFFF;

/// One entry as it will be written. Every header field is public so tests
/// can write inconsistent archives.
#[derive(Debug, Clone)]
pub struct TestEntry {
    pub name: Vec<u8>,
    pub method: u16,
    pub flags: u16,
    /// Bytes written after the local header.
    pub payload: Vec<u8>,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub mod_time: u16,
    pub mod_date: u16,
    /// Central directory extra field block.
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
    pub lfh_signature: u32,
}

impl TestEntry {
    pub fn stored(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            method: METHOD_STORED,
            flags: 0,
            payload: data.to_vec(),
            crc32: crc32fast::hash(data),
            compressed_size: data.len() as u32,
            uncompressed_size: data.len() as u32,
            // 2021-03-04 05:06:08
            mod_time: (5 << 11) | (6 << 5) | 4,
            mod_date: (41 << 9) | (3 << 5) | 4,
            extra: Vec::new(),
            comment: Vec::new(),
            lfh_signature: 0x0403_4b50,
        }
    }

    pub fn deflated(name: &str, data: &[u8]) -> Self {
        let compressed = deflate(data);
        Self {
            method: METHOD_DEFLATE,
            compressed_size: compressed.len() as u32,
            payload: compressed,
            ..Self::stored(name, data)
        }
    }

    pub fn directory(name: &str) -> Self {
        Self::stored(name, b"")
    }

    pub fn raw_name(mut self, name: &[u8]) -> Self {
        self.name = name.to_vec();
        self
    }

    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn method(mut self, method: u16) -> Self {
        self.method = method;
        self
    }

    pub fn sizes(mut self, compressed: u32, uncompressed: u32) -> Self {
        self.compressed_size = compressed;
        self.uncompressed_size = uncompressed;
        self
    }

    pub fn extra_field(mut self, id: u16, data: &[u8]) -> Self {
        self.extra.extend_from_slice(&extra_field(id, data));
        self
    }

    pub fn raw_extra(mut self, block: &[u8]) -> Self {
        self.extra = block.to_vec();
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn lfh_signature(mut self, signature: u32) -> Self {
        self.lfh_signature = signature;
        self
    }
}

#[derive(Debug, Default)]
pub struct ZipBuilder {
    entries: Vec<TestEntry>,
    comment: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, entry: TestEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Write ZIP64 trailer records and move every entry's sizes and local
    /// header offset into a ZIP64 extra field.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::new();

        for entry in &self.entries {
            offsets.push(out.len() as u64);
            put_u32(&mut out, entry.lfh_signature);
            put_u16(&mut out, 20);
            put_u16(&mut out, entry.flags);
            put_u16(&mut out, entry.method);
            put_u16(&mut out, entry.mod_time);
            put_u16(&mut out, entry.mod_date);
            put_u32(&mut out, entry.crc32);
            put_u32(&mut out, entry.compressed_size);
            put_u32(&mut out, entry.uncompressed_size);
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, 0);
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&entry.payload);
        }

        let cd_offset = out.len() as u64;
        for (entry, &offset) in self.entries.iter().zip(&offsets) {
            let mut extra = entry.extra.clone();
            let (compressed, uncompressed, lfh_offset) = if self.zip64 {
                let mut data = Vec::new();
                data.extend_from_slice(&(entry.uncompressed_size as u64).to_le_bytes());
                data.extend_from_slice(&(entry.compressed_size as u64).to_le_bytes());
                data.extend_from_slice(&offset.to_le_bytes());
                extra.extend_from_slice(&extra_field(0x0001, &data));
                (SENTINEL, SENTINEL, SENTINEL)
            } else {
                (entry.compressed_size, entry.uncompressed_size, offset as u32)
            };

            put_u32(&mut out, 0x0201_4b50);
            put_u16(&mut out, 0x031e);
            put_u16(&mut out, 20);
            put_u16(&mut out, entry.flags);
            put_u16(&mut out, entry.method);
            put_u16(&mut out, entry.mod_time);
            put_u16(&mut out, entry.mod_date);
            put_u32(&mut out, entry.crc32);
            put_u32(&mut out, compressed);
            put_u32(&mut out, uncompressed);
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, extra.len() as u16);
            put_u16(&mut out, entry.comment.len() as u16);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0);
            put_u32(&mut out, 0);
            put_u32(&mut out, lfh_offset);
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&extra);
            out.extend_from_slice(&entry.comment);
        }
        let cd_size = out.len() as u64 - cd_offset;
        let count = self.entries.len() as u64;

        if self.zip64 {
            let eocd64_offset = out.len() as u64;
            put_u32(&mut out, 0x0606_4b50);
            put_u64(&mut out, 44);
            put_u16(&mut out, 45);
            put_u16(&mut out, 45);
            put_u32(&mut out, 0);
            put_u32(&mut out, 0);
            put_u64(&mut out, count);
            put_u64(&mut out, count);
            put_u64(&mut out, cd_size);
            put_u64(&mut out, cd_offset);

            put_u32(&mut out, 0x0706_4b50);
            put_u32(&mut out, 0);
            put_u64(&mut out, eocd64_offset);
            put_u32(&mut out, 1);
        }

        put_u32(&mut out, 0x0605_4b50);
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        if self.zip64 {
            put_u16(&mut out, 0xFFFF);
            put_u16(&mut out, 0xFFFF);
            put_u32(&mut out, SENTINEL);
            put_u32(&mut out, SENTINEL);
        } else {
            put_u16(&mut out, count as u16);
            put_u16(&mut out, count as u16);
            put_u32(&mut out, cd_size as u32);
            put_u32(&mut out, cd_offset as u32);
        }
        put_u16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);
        out
    }
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn extra_field(id: u16, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u16(&mut out, id);
    put_u16(&mut out, data.len() as u16);
    out.extend_from_slice(data);
    out
}

/// Info-ZIP Unicode Path field body for `raw_name`.
pub fn unicode_path_field(raw_name: &[u8], name: &str, version: u8) -> Vec<u8> {
    let mut out = vec![version];
    out.extend_from_slice(&crc32fast::hash(raw_name).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out
}

/// Offset of the End of Central Directory record: the last signature
/// match in the archive.
pub fn eocd_offset(archive: &[u8]) -> usize {
    let signature = 0x0605_4b50u32.to_le_bytes();
    (0..=archive.len() - 22)
        .rev()
        .find(|&i| archive[i..i + 4] == signature)
        .unwrap()
}

/// Offset of the central directory recorded in a non-ZIP64 archive.
pub fn cd_offset(archive: &[u8]) -> usize {
    let eocd = eocd_offset(archive);
    u32::from_le_bytes(archive[eocd + 16..eocd + 20].try_into().unwrap()) as usize
}

/// Deterministic, poorly compressible test data.
pub fn noise(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}
