//! Entry content streaming.
//!
//! The Local File Header has variable-length fields (filename, extra
//! field) that may differ from the Central Directory entry, so it is read
//! again to find where the file data begins. The data range is then
//! served through a [`RangeReader`], optionally inflated, with the
//! inflated length checked against the declared uncompressed size.

use byteorder::{ByteOrder, LittleEndian};
use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{Result, ZipError};
use crate::io::{RangeReader, ReadAt, SharedSource};

use super::options::ReadOptions;
use super::structures::{CompressionMethod, Entry, LFH_SIGNATURE, LFH_SIZE};

/// Most bytes produced by one inflate step.
const INFLATE_CHUNK: usize = 32 * 1024;

/// Streaming raw DEFLATE decoder.
struct Inflater {
    state: Decompress,
    finished: bool,
}

impl Inflater {
    fn new() -> Self {
        Self {
            state: Decompress::new(false),
            finished: false,
        }
    }

    /// One decode step producing at most `limit` bytes. Returns the output
    /// and the number of input bytes consumed.
    fn inflate(&mut self, input: &[u8], limit: usize) -> Result<(Vec<u8>, usize)> {
        let mut out = vec![0u8; limit];
        let before_in = self.state.total_in();
        let before_out = self.state.total_out();
        let status = self
            .state
            .decompress(input, &mut out, FlushDecompress::None)?;
        let consumed = (self.state.total_in() - before_in) as usize;
        let produced = (self.state.total_out() - before_out) as usize;
        out.truncate(produced);

        if matches!(status, Status::StreamEnd) {
            self.finished = true;
        }
        Ok((out, consumed))
    }
}

/// Byte-count assertion over inflated output.
struct ByteCount {
    expected: u64,
    actual: u64,
}

impl ByteCount {
    /// Output budget for the next step: one byte past the declared size is
    /// enough to detect an overrun.
    fn allowance(&self) -> u64 {
        self.expected.saturating_sub(self.actual).saturating_add(1)
    }

    fn add(&mut self, n: usize) -> Result<()> {
        self.actual += n as u64;
        if self.actual > self.expected {
            return Err(ZipError::TooManyBytes {
                expected: self.expected,
                actual: self.actual,
            });
        }
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        if self.actual < self.expected {
            return Err(ZipError::NotEnoughBytes {
                expected: self.expected,
                actual: self.actual,
            });
        }
        Ok(())
    }
}

/// Content stream of one entry.
///
/// Holds a reference on the byte source until the stream ends, fails, or
/// is dropped; whichever comes first releases it.
pub struct EntryReader<R: ReadAt> {
    range: RangeReader<R>,
    inflater: Option<Inflater>,
    byte_count: Option<ByteCount>,
    /// Compressed chunk being inflated and the read position in it.
    input: Vec<u8>,
    input_pos: usize,
    input_done: bool,
    data_start: u64,
    data_end: u64,
    done: bool,
}

impl<R: ReadAt> EntryReader<R> {
    pub(crate) async fn open(
        source: &SharedSource<R>,
        file_size: u64,
        entry: &Entry,
        read_options: ReadOptions,
        validate_entry_sizes: bool,
    ) -> Result<Self> {
        // Encrypted entries are never inflated: the caller gets the raw
        // (still encrypted) bytes.
        let decompress = match entry.compression_method {
            CompressionMethod::Stored => false,
            CompressionMethod::Deflate => read_options.decompress && !entry.is_encrypted(),
            CompressionMethod::Unknown(method) => {
                return Err(ZipError::UnsupportedCompressionMethod(method));
            }
        };

        let mut lfh = [0u8; LFH_SIZE];
        source.read_exact_at(&mut lfh, entry.lfh_offset).await?;

        let signature = LittleEndian::read_u32(&lfh[0..4]);
        if signature != LFH_SIGNATURE {
            return Err(ZipError::InvalidLocalHeaderSignature(signature));
        }

        // Data starts after: LFH (30 bytes) + filename + extra field
        let file_name_length = LittleEndian::read_u16(&lfh[26..28]) as u64;
        let extra_field_length = LittleEndian::read_u16(&lfh[28..30]) as u64;
        let data_start = entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        let data_end = data_start
            .checked_add(entry.compressed_size)
            .filter(|end| *end <= file_size)
            .ok_or(ZipError::FileDataOverflow {
                start: data_start,
                size: entry.compressed_size,
                file_size,
            })?;

        log::debug!(
            "streaming {} from [{data_start}, {data_end}){}",
            entry.file_name,
            if decompress { ", inflating" } else { "" }
        );

        let byte_count = (decompress && validate_entry_sizes).then_some(ByteCount {
            expected: entry.uncompressed_size,
            actual: 0,
        });

        Ok(Self {
            range: source.range_reader(data_start, data_end),
            inflater: decompress.then(Inflater::new),
            byte_count,
            input: Vec::new(),
            input_pos: 0,
            input_done: false,
            data_start,
            data_end,
            done: false,
        })
    }

    /// Absolute byte range of the entry's file data.
    pub fn data_range(&self) -> (u64, u64) {
        (self.data_start, self.data_end)
    }

    pub fn is_decompressing(&self) -> bool {
        self.inflater.is_some()
    }

    /// Whether the stream still holds its byte source reference.
    pub fn is_active(&self) -> bool {
        self.range.is_active()
    }

    /// Next chunk of content, `None` at end. After an error the stream is
    /// finished and its reference released.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        let result = self.pull().await;
        match &result {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                self.done = true;
                self.range.cancel();
            }
        }
        result
    }

    async fn pull(&mut self) -> Result<Option<Vec<u8>>> {
        if self.inflater.is_none() {
            // stored: the range reader already bounds the length
            return self.range.next_chunk().await;
        }

        loop {
            if self.inflater.as_ref().is_some_and(|i| i.finished) {
                if let Some(count) = &self.byte_count {
                    count.finish()?;
                }
                return Ok(None);
            }

            if self.input_pos == self.input.len() && !self.input_done {
                match self.range.next_chunk().await? {
                    Some(chunk) => {
                        self.input = chunk;
                        self.input_pos = 0;
                    }
                    None => self.input_done = true,
                }
            }

            let limit = match &self.byte_count {
                Some(count) => count.allowance().min(INFLATE_CHUNK as u64) as usize,
                None => INFLATE_CHUNK,
            };
            let Some(inflater) = self.inflater.as_mut() else {
                return Ok(None);
            };
            let (out, consumed) = inflater.inflate(&self.input[self.input_pos..], limit)?;
            self.input_pos += consumed;
            if inflater.finished {
                // trailing bytes after the stream end are ignored
                self.range.cancel();
            }

            if out.is_empty() {
                let stalled = consumed == 0 && !inflater.finished;
                if stalled && (self.input_done || self.input_pos < self.input.len()) {
                    return Err(ZipError::TruncatedDeflate);
                }
                continue;
            }

            if let Some(count) = self.byte_count.as_mut() {
                count.add(out.len())?;
            }
            return Ok(Some(out));
        }
    }

    /// Read the remaining content into memory.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            content.extend_from_slice(&chunk);
        }
        Ok(content)
    }
}
