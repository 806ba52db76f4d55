//! Directory index ("DICOMDIR") handling.
//!
//! A directory index lists the files of a study explicitly. Its records seed
//! series file lists directly, without any heuristic matching.

use std::path::{Path, PathBuf};

use crate::dicom::DirectoryRecord;

/// File name of a directory index (compared case-insensitively).
pub const DIRECTORY_INDEX_NAME: &str = "DICOMDIR";

/// Whether `path` names a directory index.
pub fn is_directory_index(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.eq_ignore_ascii_case(DIRECTORY_INDEX_NAME))
        .unwrap_or(false)
}

/// Series groups and companion files declared by a directory index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryIndex {
    /// Image files per series, in record order.
    pub series: Vec<Vec<PathBuf>>,
    /// Non-image references plus the index file itself.
    pub companions: Vec<PathBuf>,
}

impl DirectoryIndex {
    /// Build the index from the records of `index_path`.
    pub fn from_records(index_path: &Path, records: &[DirectoryRecord]) -> Self {
        let base = index_path.parent().unwrap_or_else(|| Path::new(""));
        let mut index = DirectoryIndex {
            series: Vec::new(),
            companions: vec![index_path.to_path_buf()],
        };

        for record in records {
            let kind = record.record_type.trim().to_ascii_uppercase();
            let file = record
                .referenced_file_id
                .as_deref()
                .filter(|id| !id.trim().is_empty())
                .map(|id| resolve_file_id(base, id));

            match kind.as_str() {
                "SERIES" => index.series.push(Vec::new()),
                "IMAGE" => {
                    if let Some(file) = file {
                        match index.series.last_mut() {
                            Some(group) => group.push(file),
                            None => index.series.push(vec![file]),
                        }
                    }
                }
                _ => {
                    if let Some(file) = file {
                        if !index.companions.contains(&file) {
                            index.companions.push(file);
                        }
                    }
                }
            }
        }

        index
    }

    /// The `n`th series group that has at least one image file.
    pub fn non_empty_series(&self, n: usize) -> Option<&[PathBuf]> {
        self.series
            .iter()
            .filter(|group| !group.is_empty())
            .nth(n)
            .map(Vec::as_slice)
    }
}

/// Resolve a referenced file id (`\` or `/` separated) against `base`.
pub fn resolve_file_id(base: &Path, id: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for component in id
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .split(['\\', '/'])
        .filter(|c| !c.is_empty())
    {
        path.push(component);
    }
    path
}
