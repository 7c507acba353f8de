mod http;
mod local;
mod memory;
mod shared;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;
pub use memory::MemoryReader;
pub use shared::{RangeReader, SharedSource, SourceGuard};

use async_trait::async_trait;
use std::io;

/// Trait for random access reading from a data source
///
/// Implementations may return short reads; callers that need an exact
/// number of bytes go through [`SharedSource::read_exact_at`].
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Release the underlying resource. Called once, when the last
    /// [`SharedSource`] reference is released.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}
