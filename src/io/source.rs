//! File sources: where series files come from.
//!
//! A [`FileSource`] creates [`RangeReader`]s for paths and lists directories.
//! The sibling file resolver only needs directory listings; the byte-range
//! resolver and the tile decoder only need readers. Keeping both behind one
//! trait lets tests substitute an in-memory store for the filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::IoError;

use super::RangeReader;

/// Trait for creating range readers and enumerating files.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// The type of range reader this source creates.
    type Reader: RangeReader + 'static;

    /// Create a range reader for the given file.
    ///
    /// Readers are cheap to create and are expected to be dropped at the end
    /// of each plane read, which releases the underlying file handle.
    async fn create_reader(&self, path: &Path) -> Result<Self::Reader, IoError>;

    /// List regular files directly inside `dir`, sorted by path.
    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, IoError>;

    /// List directories directly inside `dir`, sorted by path.
    async fn list_directories(&self, dir: &Path) -> Result<Vec<PathBuf>, IoError>;
}
