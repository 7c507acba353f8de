//! # zipwalk
//!
//! A streaming ZIP reader over random-access byte sources.
//!
//! The archive is opened by locating the End of Central Directory record
//! near the end of the source, then walking the central directory one
//! record per call. Entry content is served as a chunked stream that can be
//! inflated and checked against the declared sizes, without ever holding
//! the whole archive in memory.
//!
//! ## Features
//!
//! - Local files, in-memory buffers and HTTP URLs (via Range requests)
//! - ZIP64 archives and per-entry ZIP64 extra fields
//! - STORED and DEFLATE entries
//! - CP437 and UTF-8 names, including the Info-ZIP Unicode Path field
//! - Rejection of absolute and escaping entry paths
//! - Reference-counted sources: the source closes only after the archive
//!   and all of its content streams are done with it
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zipwalk::{Archive, HttpRangeReader, OpenOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(HttpRangeReader::new("https://example.com/archive.zip".to_string()).await?);
//!     let mut archive = Archive::open(reader, OpenOptions::new()).await?;
//!
//!     for entry in archive.list_entries().await? {
//!         println!("{}", entry.file_name);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Result, ZipError};
pub use io::{
    HttpRangeReader, LocalFileReader, MemoryReader, RangeReader, ReadAt, SharedSource, SourceGuard,
};
pub use zip::{
    Archive, ArchiveEntry, CompressionMethod, DosDateTime, Entry, EntryReader, ExtractSummary,
    OpenOptions, ReadOptions, ZipExtractor, ZipString,
};
