//! ZIP archive parsing and entry streaming.
//!
//! ## Architecture
//!
//! - [`structures`]: ZIP records (EOCD, ZIP64 records, entries) and constants
//! - [`decode`]: little-endian helpers, CP437, DOS timestamps, name checks
//! - [`locator`]: End of Central Directory discovery, including ZIP64
//! - [`parser`]: central directory record parsing
//! - [`archive`]: the archive handle and its entry-by-entry walk
//! - [`stream`]: per-entry content streams
//! - [`extractor`]: writing entries to disk or another sink
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The EOCD is read first (from the end of the file), then the Central
//! Directory one record at a time, so listing an archive never touches
//! file data.
//!
//! ## Limitations
//!
//! - STORED and DEFLATE only
//! - Traditional encryption is detected but not decrypted; strong
//!   encryption is rejected
//! - No multi-disk archives

pub mod archive;
pub mod decode;
pub mod extractor;
pub mod locator;
pub mod options;
pub mod parser;
pub mod stream;
pub mod structures;

pub use archive::Archive;
pub use decode::DosDateTime;
pub use extractor::{ExtractSummary, ZipExtractor};
pub use options::{OpenOptions, ReadOptions};
pub use stream::EntryReader;
pub use structures::*;
