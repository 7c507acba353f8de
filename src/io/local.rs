use async_trait::async_trait;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use super::ReadAt;

/// Local file reader with random access support
///
/// The file handle is dropped on [`ReadAt::close`]; reads issued after that
/// fail instead of touching a stale descriptor.
pub struct LocalFileReader {
    file: Mutex<Option<File>>,
    size: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> io::Result<Self> {
        Self::from_file(File::open(path)?)
    }

    /// Wrap an already opened file.
    pub fn from_file(file: File) -> io::Result<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(Some(file)),
            size,
        })
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("file lock poisoned"))?;
        let file = guard
            .as_ref()
            .ok_or_else(|| io::Error::other("file is closed"))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            file.read_at(buf, offset)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            file.seek_read(buf, offset)
        }

        #[cfg(not(any(unix, windows)))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = file;
            file.seek(SeekFrom::Start(offset))?;
            file.read(buf)
        }
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn close(&self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("file lock poisoned"))?;
        guard.take();
        Ok(())
    }
}
