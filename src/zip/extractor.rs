use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::io::ReadAt;

use super::archive::Archive;
use super::structures::Entry;

/// Counts reported by [`ZipExtractor::extract_all`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Writes archive entries to the filesystem or another sink.
///
/// Entry names were already checked by the archive walk (no absolute
/// paths, no `..` segments), so joining them under a target directory
/// cannot escape it.
pub struct ZipExtractor<R: ReadAt> {
    archive: Archive<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(archive: Archive<R>) -> Self {
        Self { archive }
    }

    pub fn archive(&self) -> &Archive<R> {
        &self.archive
    }

    pub fn archive_mut(&mut self) -> &mut Archive<R> {
        &mut self.archive
    }

    pub fn into_archive(self) -> Archive<R> {
        self.archive
    }

    /// List all remaining entries in the archive
    pub async fn list_files(&mut self) -> Result<Vec<Entry>> {
        self.archive.list_entries().await
    }

    /// Extract every remaining entry under `target_dir`.
    ///
    /// Each file is fully written before the next record is read.
    pub async fn extract_all(&mut self, target_dir: &Path) -> Result<ExtractSummary> {
        let mut summary = ExtractSummary::default();

        while let Some(item) = self.archive.next_entry().await? {
            let entry = item.entry();
            let Some(name) = entry.file_name.as_str() else {
                log::warn!("skipping entry with undecoded name: {}", entry.file_name);
                continue;
            };
            let output_path = target_dir.join(name);

            if entry.is_directory() {
                fs::create_dir_all(&output_path).await?;
                summary.directories += 1;
                continue;
            }

            let written = match item.content() {
                Some(content) => {
                    write_file(&output_path, content).await?;
                    content.len() as u64
                }
                None => self.extract_to_file(entry, &output_path).await?,
            };
            summary.files += 1;
            summary.bytes += written;
        }

        Ok(summary)
    }

    /// Stream one entry into a file, creating parent directories.
    pub async fn extract_to_file(&self, entry: &Entry, output_path: &Path) -> Result<u64> {
        create_parent(output_path).await?;
        let mut file = fs::File::create(output_path).await?;
        let written = self.extract_to_writer(entry, &mut file).await?;
        file.flush().await?;
        Ok(written)
    }

    /// Stream one entry into `writer`, returning the bytes written.
    pub async fn extract_to_writer<W>(&self, entry: &Entry, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if entry.is_encrypted() {
            log::warn!("{} is encrypted; writing raw bytes", entry.file_name);
        }

        let mut reader = self.archive.open_entry(entry).await?;
        let mut written = 0u64;
        while let Some(chunk) = reader.next_chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        Ok(written)
    }

    /// Extract file data to memory
    pub async fn extract_to_memory(&self, entry: &Entry) -> Result<Vec<u8>> {
        self.archive.read_entry(entry).await
    }
}

async fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    create_parent(path).await?;
    fs::write(path, data).await?;
    Ok(())
}

/// Output path for `name` under `dir`, optionally keeping only the base
/// name.
pub fn output_path(dir: Option<&Path>, name: &str, junk_paths: bool) -> PathBuf {
    let relative = if junk_paths {
        Path::new(name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(name))
    } else {
        PathBuf::from(name)
    };
    match dir {
        Some(dir) => dir.join(relative),
        None => relative,
    }
}
