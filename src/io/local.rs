//! Local filesystem implementation of [`FileSource`].

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use crate::error::IoError;

use super::{FileSource, RangeReader};

/// Range reader over one local file.
///
/// Holds an open handle for as long as the reader lives. Seek and read are
/// serialized through a mutex because the handle has a single cursor.
pub struct LocalFileReader {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    /// Open `path` for reading.
    pub async fn open(path: &Path) -> Result<Self, IoError> {
        let file = File::open(path)
            .await
            .map_err(|e| IoError::from_std(path, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| IoError::from_std(path, e))?
            .len();

        Ok(Self {
            file: Mutex::new(file),
            size,
            identifier: path.display().to_string(),
        })
    }
}

#[async_trait]
impl RangeReader for LocalFileReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if offset.saturating_add(len as u64) > self.size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }

        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| IoError::Read(format!("{}: {}", self.identifier, e)))?;

        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)
            .await
            .map_err(|e| IoError::Read(format!("{}: {}", self.identifier, e)))?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// [`FileSource`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSource;

impl LocalFileSource {
    pub fn new() -> Self {
        Self
    }

    async fn list_entries(dir: &Path, want_dirs: bool) -> Result<Vec<PathBuf>, IoError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| IoError::from_std(dir, e))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| IoError::from_std(dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| IoError::from_std(&entry.path(), e))?;
            if file_type.is_dir() == want_dirs {
                paths.push(entry.path());
            }
        }

        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl FileSource for LocalFileSource {
    type Reader = LocalFileReader;

    async fn create_reader(&self, path: &Path) -> Result<Self::Reader, IoError> {
        LocalFileReader::open(path).await
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, IoError> {
        Self::list_entries(dir, false).await
    }

    async fn list_directories(&self, dir: &Path) -> Result<Vec<PathBuf>, IoError> {
        Self::list_entries(dir, true).await
    }
}
