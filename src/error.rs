//! Error type for archive parsing and entry streaming.
//!
//! Every failure is a [`ZipError`] variant carrying a stable message. The
//! messages are part of the public behaviour: callers match on them, so
//! they are kept word for word across releases.

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ZipError>;

/// Errors raised while opening an archive, walking its central directory
/// or streaming entry content.
#[derive(Debug, Error)]
pub enum ZipError {
    /// I/O error surfaced by the byte source, passed through untouched.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The byte source returned fewer bytes than a header read required.
    #[error("unexpected EOF")]
    UnexpectedEof,

    #[error("zip file too large: {0} bytes exceeds the 2^53 - 1 byte limit")]
    TooLarge(u64),

    // Structural
    #[error("end of central directory record signature not found")]
    EocdrNotFound,

    #[error("invalid comment length. expected: {expected}. found: {found}")]
    InvalidCommentLength { expected: usize, found: u16 },

    #[error("invalid zip64 end of central directory locator signature")]
    InvalidZip64LocatorSignature,

    #[error("invalid zip64 end of central directory record signature")]
    InvalidZip64EocdrSignature,

    #[error("invalid central directory file header signature: {0:#x}")]
    InvalidCentralDirectorySignature(u32),

    #[error("invalid local file header signature: {0:#x}")]
    InvalidLocalHeaderSignature(u32),

    #[error("extra field length exceeds extra field buffer size")]
    ExtraFieldOverrun,

    #[error("expected zip64 extended information extra field")]
    MissingZip64ExtraField,

    /// The ZIP64 extra field is too short for a value the header sentineled.
    #[error("zip64 extended information extra field does not include {0}")]
    Zip64FieldMissing(&'static str),

    // Unsupported features
    #[error("multi-disk zip files are not supported: found disk number: {0}")]
    MultiDisk(u16),

    #[error("strong encryption is not supported")]
    StrongEncryption,

    #[error("unsupported compression method: {0}")]
    UnsupportedCompressionMethod(u16),

    // Consistency
    #[error("compressed/uncompressed size mismatch for stored file: {compressed} != {uncompressed}")]
    StoredSizeMismatch { compressed: u64, uncompressed: u64 },

    #[error("file data overflows file bounds: {start} + {size} > {file_size}")]
    FileDataOverflow {
        start: u64,
        size: u64,
        file_size: u64,
    },

    #[error("too many bytes in the stream. expected {expected}. got at least {actual}")]
    TooManyBytes { expected: u64, actual: u64 },

    #[error("not enough bytes in the stream. expected {expected}. got only {actual}")]
    NotEnoughBytes { expected: u64, actual: u64 },

    #[error("invalid deflate data: {0}")]
    Inflate(#[from] flate2::DecompressError),

    #[error("unexpected end of deflate stream")]
    TruncatedDeflate,

    // Path safety
    #[error("invalid characters in fileName: {0}")]
    InvalidCharacters(String),

    #[error("absolute path: {0}")]
    AbsolutePath(String),

    #[error("invalid relative path: {0}")]
    InvalidRelativePath(String),

    // Lifecycle misuse
    #[error("content can only be read while the zip file is open")]
    ContentAfterClose,

    #[error("entries can only be read while the zip file is open")]
    EntriesAfterClose,

    #[error("open streams after disposal: {0} content stream(s) still active")]
    OpenStreamsAfterDisposal(usize),

    #[error("invalid unref")]
    InvalidUnref,
}

impl ZipError {
    /// Whether the error reports a misuse of the archive or stream lifecycle
    /// rather than a problem with the archive bytes.
    pub fn is_lifecycle_misuse(&self) -> bool {
        matches!(
            self,
            ZipError::ContentAfterClose
                | ZipError::EntriesAfterClose
                | ZipError::OpenStreamsAfterDisposal(_)
                | ZipError::InvalidUnref
        )
    }
}
