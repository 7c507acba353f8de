//! The archive handle and its central directory walk.
//!
//! [`Archive::next_entry`] parses one central directory record per call.
//! The walk is a small state machine:
//!
//! - `Reading`: records remain; each call reads one and advances the cursor
//! - `Draining`: every declared entry was yielded; the next call ends the walk
//! - `Done`: the walk has produced its single terminal result (the end, or
//!   an error) and only yields `None` from then on
//!
//! Independently of the walk, the handle is open while it holds its
//! reference on the byte source. Closing releases that reference exactly
//! once; content streams keep their own references and outlive it.

use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, ZipError};
use crate::io::{LocalFileReader, MemoryReader, ReadAt, SharedSource, SourceGuard};

use super::locator::locate;
use super::options::{OpenOptions, ReadOptions};
use super::parser::{CentralRecordHeader, parse_entry};
use super::stream::EntryReader;
use super::structures::{ArchiveEntry, CDFH_MIN_SIZE, Entry, ZipString};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    Reading { cursor: u64 },
    Draining,
    Done,
}

impl WalkState {
    fn start(cd_offset: u64, entry_count: u64) -> Self {
        WalkState::Reading { cursor: cd_offset }.settle(0, entry_count)
    }

    /// State after `entries_read` records were consumed, the last one
    /// ending at `cursor`.
    fn advance(self, cursor: u64, entries_read: u64, entry_count: u64) -> Self {
        match self {
            WalkState::Reading { .. } => {
                WalkState::Reading { cursor }.settle(entries_read, entry_count)
            }
            other => other,
        }
    }

    fn settle(self, entries_read: u64, entry_count: u64) -> Self {
        match self {
            WalkState::Reading { .. } if entries_read >= entry_count => WalkState::Draining,
            other => other,
        }
    }
}

/// An open ZIP archive.
///
/// Call [`Archive::close`] when done with it: only `close` reports content
/// streams that are still open ([`ZipError::OpenStreamsAfterDisposal`]).
/// Dropping the archive releases its reference all the same, but can only
/// log a warning about live streams.
///
/// ## Example
///
/// ```no_run
/// use zipwalk::{Archive, OpenOptions};
///
/// # async fn run() -> zipwalk::Result<()> {
/// let mut archive = Archive::from_path("archive.zip", OpenOptions::for_descriptor()).await?;
/// while let Some(item) = archive.next_entry().await? {
///     let entry = item.entry();
///     if !entry.is_directory() {
///         let data = archive.read_entry(entry).await?;
///         println!("{}: {} bytes", entry.file_name, data.len());
///     }
/// }
/// archive.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Archive<R: ReadAt> {
    source: SharedSource<R>,
    /// The archive's own reference; `None` once closed.
    guard: Option<SourceGuard<R>>,
    state: WalkState,
    file_size: u64,
    entry_count: u64,
    entries_read: u64,
    cd_offset: u64,
    comment: ZipString,
    zip64: bool,
    options: OpenOptions,
}

impl Archive<MemoryReader> {
    /// Open an archive held in memory.
    pub async fn from_buffer(data: impl Into<Vec<u8>>, options: OpenOptions) -> Result<Self> {
        Self::open(Arc::new(MemoryReader::new(data)), options).await
    }
}

impl Archive<LocalFileReader> {
    /// Open an archive on the local filesystem.
    pub async fn from_path(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let reader = LocalFileReader::new(path.as_ref())?;
        Self::open(Arc::new(reader), options).await
    }
}

impl<R: ReadAt> Archive<R> {
    /// Open an archive spanning the whole reader.
    pub async fn open(reader: Arc<R>, options: OpenOptions) -> Result<Self> {
        let size = reader.size();
        Self::open_with_size(reader, size, options).await
    }

    /// Open an archive whose total length is `total_size` bytes.
    pub async fn open_with_size(reader: Arc<R>, total_size: u64, options: OpenOptions) -> Result<Self> {
        Self::from_source(SharedSource::new(reader), total_size, options).await
    }

    /// Open over an existing shared source. Callers that keep their own
    /// [`SourceGuard`] keep the source open past the archive's lifetime.
    pub async fn from_source(
        source: SharedSource<R>,
        total_size: u64,
        options: OpenOptions,
    ) -> Result<Self> {
        // released by close(), or by the drop of a failed open
        let guard = source.acquire();
        let location = locate(&source, total_size, options.decode_strings).await?;

        Ok(Self {
            state: WalkState::start(location.cd_offset, location.entry_count),
            guard: Some(guard),
            source,
            file_size: total_size,
            entry_count: location.entry_count,
            entries_read: 0,
            cd_offset: location.cd_offset,
            comment: location.comment,
            zip64: location.zip64,
            options,
        })
    }

    /// Parse and yield the next entry.
    ///
    /// Returns `Ok(None)` once every declared entry was yielded. The first
    /// error ends the walk: later calls return `Ok(None)`. With
    /// `auto_close`, either outcome closes the archive first.
    pub async fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        let (cursor, state) = match self.state {
            WalkState::Done => return Ok(None),
            WalkState::Draining => return self.finish(),
            WalkState::Reading { cursor } => (cursor, self.state),
        };

        if !self.is_open() {
            return Err(self.fail(ZipError::EntriesAfterClose));
        }

        let (entry, next_cursor) = match self.read_record(cursor).await {
            Ok(parsed) => parsed,
            Err(e) => return Err(self.fail(e)),
        };
        self.entries_read += 1;
        self.state = state.advance(next_cursor, self.entries_read, self.entry_count);

        log::debug!(
            "entry {}/{}: {}",
            self.entries_read,
            self.entry_count,
            entry.file_name
        );

        if !self.options.with_content {
            return Ok(Some(ArchiveEntry::Ref(entry)));
        }
        match self.read_entry(&entry).await {
            Ok(content) => Ok(Some(ArchiveEntry::WithContent { entry, content })),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Read one central directory record at `cursor`, returning the entry
    /// and the cursor of the following record.
    async fn read_record(&self, cursor: u64) -> Result<(Entry, u64)> {
        let mut fixed = [0u8; CDFH_MIN_SIZE];
        self.source.read_exact_at(&mut fixed, cursor).await?;
        let header = CentralRecordHeader::from_bytes(&fixed)?;

        let cursor = cursor + CDFH_MIN_SIZE as u64;
        let mut variable = vec![0u8; header.variable_length()];
        self.source.read_exact_at(&mut variable, cursor).await?;

        let entry = parse_entry(&header, &variable, &self.options)?;
        Ok((entry, cursor + variable.len() as u64))
    }

    fn finish(&mut self) -> Result<Option<ArchiveEntry>> {
        self.state = WalkState::Done;
        if self.options.auto_close {
            self.release_reference()?;
        }
        Ok(None)
    }

    fn fail(&mut self, err: ZipError) -> ZipError {
        self.state = WalkState::Done;
        if self.options.auto_close
            && let Err(close_err) = self.release_reference()
        {
            log::warn!("failed to close archive after error: {close_err}");
        }
        err
    }

    /// Drop the archive's own reference, returning how many content
    /// streams were still open.
    fn release_reference(&mut self) -> Result<usize> {
        let Some(guard) = self.guard.take() else {
            return Ok(0);
        };
        let open_streams = self.source.open_streams();
        log::debug!("closing archive with {open_streams} open stream(s)");
        guard.release()?;
        Ok(open_streams)
    }

    /// Close the archive. Idempotent.
    ///
    /// The archive's reference is released on the first call no matter
    /// what. Closing while content streams are still open is reported as
    /// [`ZipError::OpenStreamsAfterDisposal`]; those streams are not cut
    /// short and the source closes once the last one finishes.
    pub fn close(&mut self) -> Result<()> {
        match self.release_reference()? {
            0 => Ok(()),
            open_streams => Err(ZipError::OpenStreamsAfterDisposal(open_streams)),
        }
    }

    /// Open a content stream for `entry`.
    pub async fn open_entry(&self, entry: &Entry) -> Result<EntryReader<R>> {
        self.open_entry_with(entry, ReadOptions::default()).await
    }

    pub async fn open_entry_with(
        &self,
        entry: &Entry,
        read_options: ReadOptions,
    ) -> Result<EntryReader<R>> {
        if !self.is_open() {
            return Err(ZipError::ContentAfterClose);
        }
        EntryReader::open(
            &self.source,
            self.file_size,
            entry,
            read_options,
            self.options.validate_entry_sizes,
        )
        .await
    }

    /// Read an entry's whole content into memory.
    pub async fn read_entry(&self, entry: &Entry) -> Result<Vec<u8>> {
        self.open_entry(entry).await?.read_to_end().await
    }

    /// Walk the remaining central directory records into a list.
    pub async fn list_entries(&mut self) -> Result<Vec<Entry>> {
        let remaining = self.entry_count.saturating_sub(self.entries_read);
        let mut entries = Vec::with_capacity(remaining.min(u16::MAX as u64) as usize);
        while let Some(item) = self.next_entry().await? {
            entries.push(item.into_entry());
        }
        Ok(entries)
    }

    pub fn is_open(&self) -> bool {
        self.guard.is_some()
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn central_directory_offset(&self) -> u64 {
        self.cd_offset
    }

    pub fn comment(&self) -> &ZipString {
        &self.comment
    }

    pub fn is_zip64(&self) -> bool {
        self.zip64
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Content streams currently holding a reference on the source.
    pub fn open_stream_count(&self) -> usize {
        self.source.open_streams()
    }

    pub fn source(&self) -> &SharedSource<R> {
        &self.source
    }
}

impl<R: ReadAt> Drop for Archive<R> {
    fn drop(&mut self) {
        match self.release_reference() {
            Ok(0) => {}
            Ok(open_streams) => {
                log::warn!("archive dropped with {open_streams} content stream(s) still open")
            }
            Err(e) => log::warn!("failed to close archive: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_state_transitions() {
        assert_eq!(WalkState::start(10, 0), WalkState::Draining);

        let state = WalkState::start(10, 2);
        assert_eq!(state, WalkState::Reading { cursor: 10 });
        let state = state.advance(60, 1, 2);
        assert_eq!(state, WalkState::Reading { cursor: 60 });
        assert_eq!(state.advance(110, 2, 2), WalkState::Draining);
        assert_eq!(WalkState::Done.advance(0, 3, 2), WalkState::Done);
    }
}
