//! Reference-counted ownership of a byte source.
//!
//! The archive handle and every live content stream each hold one
//! reference. When the count returns to zero the source is closed and
//! the closed notification fires. References are normally taken as
//! [`SourceGuard`]s, which release exactly once when dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

use super::ReadAt;
use crate::error::{Result, ZipError};

/// Largest chunk a [`RangeReader`] requests in one read.
pub const MAX_CHUNK_SIZE: usize = 0x10000;

struct Inner<R: ReadAt> {
    reader: Arc<R>,
    refs: AtomicUsize,
    streams: AtomicUsize,
    closed: watch::Sender<bool>,
}

/// A byte source shared between an archive and its content streams.
pub struct SharedSource<R: ReadAt> {
    inner: Arc<Inner<R>>,
}

impl<R: ReadAt> Clone for SharedSource<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: ReadAt> SharedSource<R> {
    /// Wrap a reader. The reference count starts at zero.
    pub fn new(reader: Arc<R>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                reader,
                refs: AtomicUsize::new(0),
                streams: AtomicUsize::new(0),
                closed,
            }),
        }
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.inner.reader
    }

    pub fn size(&self) -> u64 {
        self.inner.reader.size()
    }

    pub fn ref_count(&self) -> usize {
        self.inner.refs.load(Ordering::SeqCst)
    }

    /// References currently held by [`RangeReader`]s.
    pub fn open_streams(&self) -> usize {
        self.inner.streams.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Take one reference, returned as a guard that releases on drop.
    pub fn acquire(&self) -> SourceGuard<R> {
        self.inner.refs.fetch_add(1, Ordering::SeqCst);
        SourceGuard {
            source: Some(self.clone()),
            stream: false,
        }
    }

    fn acquire_stream(&self) -> SourceGuard<R> {
        self.inner.streams.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.acquire();
        guard.stream = true;
        guard
    }

    /// Drop one reference taken without a guard (see
    /// [`SourceGuard::into_raw`]). Releasing at zero is a usage error.
    pub fn release(&self) -> Result<()> {
        let previous = self
            .inner
            .refs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_err(|_| ZipError::InvalidUnref)?;
        if previous == 1 {
            self.close_source()?;
        }
        Ok(())
    }

    fn close_source(&self) -> Result<()> {
        let result = self.inner.reader.close();
        self.inner.closed.send_replace(true);
        log::debug!("byte source closed");
        Ok(result?)
    }

    /// Resolves once the last reference has been released and the source
    /// closed.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Fill `buf` from `position`, failing on a short read.
    pub async fn read_exact_at(&self, buf: &mut [u8], position: u64) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .inner
                .reader
                .read_at(position + filled as u64, &mut buf[filled..])
                .await?;
            if n == 0 {
                return Err(ZipError::UnexpectedEof);
            }
            filled += n;
        }
        Ok(())
    }

    /// A reader over `[start, end)`. An empty range yields an already ended
    /// reader that takes no reference and never reads.
    pub fn range_reader(&self, start: u64, end: u64) -> RangeReader<R> {
        let guard = (start < end).then(|| self.acquire_stream());
        RangeReader {
            source: self.clone(),
            guard,
            position: start,
            end: end.max(start),
        }
    }
}

/// One reference on a [`SharedSource`], released exactly once.
pub struct SourceGuard<R: ReadAt> {
    source: Option<SharedSource<R>>,
    stream: bool,
}

impl<R: ReadAt> SourceGuard<R> {
    fn take_source(&mut self) -> Option<SharedSource<R>> {
        let source = self.source.take()?;
        if self.stream {
            source.inner.streams.fetch_sub(1, Ordering::SeqCst);
        }
        Some(source)
    }

    /// Release now, reporting errors from closing the source.
    pub fn release(mut self) -> Result<()> {
        match self.take_source() {
            Some(source) => source.release(),
            None => Ok(()),
        }
    }

    /// Give up the guard without releasing; the caller must pair this with
    /// [`SharedSource::release`].
    pub fn into_raw(mut self) -> SharedSource<R> {
        self.take_source()
            .unwrap_or_else(|| unreachable!("guard already released"))
    }

    pub fn source(&self) -> Option<&SharedSource<R>> {
        self.source.as_ref()
    }
}

impl<R: ReadAt> Drop for SourceGuard<R> {
    fn drop(&mut self) {
        if let Some(source) = self.take_source()
            && let Err(e) = source.release()
        {
            log::warn!("failed to release byte source: {e}");
        }
    }
}

/// Bounded chunked reads over a byte range, holding a source reference
/// until the range is exhausted, an error occurs, or the reader is dropped.
pub struct RangeReader<R: ReadAt> {
    source: SharedSource<R>,
    guard: Option<SourceGuard<R>>,
    position: u64,
    end: u64,
}

impl<R: ReadAt> RangeReader<R> {
    pub fn remaining(&self) -> u64 {
        self.end - self.position
    }

    /// Whether this reader still holds its source reference.
    pub fn is_active(&self) -> bool {
        self.guard.is_some()
    }

    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.guard.is_none() || self.position >= self.end {
            self.guard = None;
            return Ok(None);
        }

        let len = self.remaining().min(MAX_CHUNK_SIZE as u64) as usize;
        let mut buf = vec![0u8; len];
        if let Err(e) = self.source.read_exact_at(&mut buf, self.position).await {
            self.guard = None;
            return Err(e);
        }
        self.position += len as u64;
        if self.position == self.end {
            self.guard = None;
        }
        Ok(Some(buf))
    }

    /// Stop early, releasing the reference.
    pub fn cancel(&mut self) {
        self.guard = None;
    }
}
