//! Sibling file resolution.
//!
//! Given one opened file, decide which other files in its directory belong
//! to the same multi-file series and in which order.
//!
//! # Algorithm
//!
//! 1. Candidates are files with the same extension as the opened file
//!    (case-insensitive), visited in sorted path order. JSON sidecars are
//!    never candidates.
//! 2. Each candidate's grouping attributes are compared against the opened
//!    file's [`SeriesKey`]. The candidate must also declare an instance
//!    number.
//! 3. Members are placed at slot `instance - 1`. A slot that is already
//!    taken sends the file to the end of the list. Empty slots are dropped
//!    at the end.
//!
//! When the opened file has no instance number, acquisition date or
//! acquisition time, grouping is skipped and the series is the single file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::ReaderConfig;
use crate::dicom::{AttributeScope, AttributeSet, AttributeSource, SIDECAR_EXTENSION};
use crate::error::CatalogError;
use crate::io::FileSource;

use super::directory::{is_directory_index, DirectoryIndex};
use super::key::{MatchOptions, Rejection, SeriesKey};

/// Extension of an instrument manifest that marks companion files.
const MANIFEST_EXTENSION: &str = "mif";

// =============================================================================
// Series File List
// =============================================================================

/// Ordered files of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFileList {
    files: Vec<PathBuf>,
    companions: Vec<PathBuf>,
}

impl SeriesFileList {
    /// A series made of one file.
    pub fn single(path: &Path) -> Self {
        Self {
            files: vec![path.to_path_buf()],
            companions: Vec::new(),
        }
    }

    /// Build from occupied slots in slot order.
    fn from_slots(slots: BTreeMap<usize, PathBuf>, companions: Vec<PathBuf>) -> Self {
        Self {
            files: slots.into_values().collect(),
            companions,
        }
    }

    /// Pixel data files in series order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Files that belong to the series but hold no pixel data.
    pub fn companions(&self) -> &[PathBuf] {
        &self.companions
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Outcome of comparing one candidate against the opened file.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Same series, at the given zero-based instance slot.
    Member { slot: usize },
    /// Not part of this series.
    Excluded(Rejection),
}

/// Classification of one candidate file.
#[derive(Debug, Clone, PartialEq)]
pub struct SiblingDecision {
    pub path: PathBuf,
    pub classification: Classification,
}

/// Zero-based slot for an instance number.
fn slot_for(instance: i64) -> usize {
    (instance - 1).max(0) as usize
}

/// Compare a candidate's grouping attributes with the opened file's key.
pub fn classify_candidate(
    opened: &SeriesKey,
    candidate: &AttributeSet,
    options: &MatchOptions,
) -> Classification {
    let key = SeriesKey::from_attributes(candidate);
    if let Err(reason) = opened.compatible(&key, options) {
        return Classification::Excluded(reason);
    }
    match candidate.instance_number {
        Some(instance) => Classification::Member {
            slot: slot_for(instance),
        },
        None => Classification::Excluded(Rejection::NoInstanceNumber),
    }
}

/// Whether `candidate` has the same type as `opened`.
fn same_kind(opened: &Path, candidate: &Path) -> bool {
    let ext = |p: &Path| p.extension().map(|e| e.to_string_lossy().to_ascii_lowercase());
    let candidate_ext = ext(candidate);
    if candidate_ext.as_deref() == Some(SIDECAR_EXTENSION) {
        return false;
    }
    candidate != opened && candidate_ext == ext(opened)
}

/// Enumerate same-type candidates for `path` in sorted order.
pub async fn list_candidates<F: FileSource>(
    files: &F,
    path: &Path,
    search_parent_directory: bool,
) -> Result<Vec<PathBuf>, CatalogError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let bare = path.parent().map_or(true, |p| p.as_os_str().is_empty());

    let mut dirs = vec![dir.to_path_buf()];
    if search_parent_directory {
        if let Some(parent) = dir.parent() {
            for sibling in files.list_directories(parent).await? {
                if sibling != dir {
                    dirs.push(sibling);
                }
            }
        }
    }

    let mut candidates = BTreeSet::new();
    for dir in &dirs {
        for file in files.list_files(dir).await? {
            // "./b.dcm" is listed for a bare "a.dcm"
            let file = match file.strip_prefix(".") {
                Ok(stripped) if bare => stripped.to_path_buf(),
                _ => file,
            };
            if same_kind(path, &file) {
                candidates.insert(file);
            }
        }
    }

    Ok(candidates.into_iter().collect())
}

/// Classify every same-type candidate of the opened file.
pub async fn classify_siblings<F: FileSource, A: AttributeSource>(
    files: &F,
    attributes: &A,
    path: &Path,
    opened: &AttributeSet,
    config: &ReaderConfig,
) -> Result<Vec<SiblingDecision>, CatalogError> {
    let key = SeriesKey::from_attributes(opened);
    let options = config.match_options();

    let mut decisions = Vec::new();
    for candidate in list_candidates(files, path, config.search_parent_directory).await? {
        let classification = match attributes
            .read_attributes(&candidate, AttributeScope::Grouping)
            .await
        {
            Ok(attrs) => classify_candidate(&key, &attrs, &options),
            Err(e) => Classification::Excluded(Rejection::Unreadable(e.to_string())),
        };

        match &classification {
            Classification::Member { slot } => {
                debug!("Grouped {} at slot {}", candidate.display(), slot)
            }
            Classification::Excluded(reason) => {
                debug!("Excluded {}: {}", candidate.display(), reason)
            }
        }

        decisions.push(SiblingDecision {
            path: candidate,
            classification,
        });
    }

    Ok(decisions)
}

fn place(slots: &mut BTreeMap<usize, PathBuf>, slot: usize, path: PathBuf) {
    let slot = if slots.contains_key(&slot) {
        slots
            .keys()
            .next_back()
            .map_or(slot, |last| last.saturating_add(1))
    } else {
        slot
    };
    slots.insert(slot, path);
}

/// Order the opened file and its member siblings into a file list.
pub fn assemble(
    path: &Path,
    opened_slot: usize,
    decisions: &[SiblingDecision],
    companions: Vec<PathBuf>,
) -> SeriesFileList {
    let mut slots = BTreeMap::new();
    place(&mut slots, opened_slot, path.to_path_buf());

    for decision in decisions {
        if let Classification::Member { slot } = decision.classification {
            place(&mut slots, slot, decision.path.clone());
        }
    }

    SeriesFileList::from_slots(slots, companions)
}

// =============================================================================
// Entry Point
// =============================================================================

/// Resolve the file list of the series containing `path`.
///
/// A directory that cannot be listed leaves the series as the single
/// opened file.
///
/// # Errors
/// Fails when a directory index declares no image files.
pub async fn resolve_series<F: FileSource, A: AttributeSource>(
    files: &F,
    attributes: &A,
    path: &Path,
    opened: &AttributeSet,
    config: &ReaderConfig,
) -> Result<SeriesFileList, CatalogError> {
    if is_directory_index(path) {
        let index = DirectoryIndex::from_records(path, &opened.directory_records);
        let group = index
            .non_empty_series(config.directory_series)
            .ok_or(CatalogError::NoUsableFiles)?;
        info!(
            "Directory index {} selects {} file(s)",
            path.display(),
            group.len()
        );
        return Ok(SeriesFileList {
            files: group.to_vec(),
            companions: index.companions,
        });
    }

    let companions = manifest_companions(files, path).await;

    if !config.group_files {
        return Ok(SeriesFileList {
            companions,
            ..SeriesFileList::single(path)
        });
    }

    let instance = match opened.instance_number {
        Some(instance)
            if opened.acquisition_date.is_some() && opened.acquisition_time.is_some() =>
        {
            instance
        }
        _ => {
            info!(
                "{} lacks instance number, acquisition date or time; not grouping",
                path.display()
            );
            return Ok(SeriesFileList {
                companions,
                ..SeriesFileList::single(path)
            });
        }
    };

    let decisions = match classify_siblings(files, attributes, path, opened, config).await {
        Ok(decisions) => decisions,
        Err(e) => {
            warn!("Cannot list siblings of {}: {}; not grouping", path.display(), e);
            return Ok(SeriesFileList {
                companions,
                ..SeriesFileList::single(path)
            });
        }
    };
    let list = assemble(path, slot_for(instance), &decisions, companions);
    debug!("Series of {} has {} file(s)", path.display(), list.len());
    Ok(list)
}

/// Companion files declared by an instrument manifest.
///
/// When the grandparent directory holds `<parent name>.mif`, every file in
/// the grandparent directory is a companion.
async fn manifest_companions<F: FileSource>(files: &F, path: &Path) -> Vec<PathBuf> {
    let parent = match path.parent() {
        Some(p) => p,
        None => return Vec::new(),
    };
    let (grandparent, name) = match (parent.parent(), parent.file_name()) {
        (Some(g), Some(n)) => (g, n),
        _ => return Vec::new(),
    };

    let mut manifest = name.to_os_string();
    manifest.push(".");
    manifest.push(MANIFEST_EXTENSION);
    let manifest = grandparent.join(manifest);

    match files.list_files(grandparent).await {
        Ok(listing) if listing.contains(&manifest) => listing,
        Ok(_) => Vec::new(),
        Err(e) => {
            debug!("Cannot list {}: {}", grandparent.display(), e);
            Vec::new()
        }
    }
}
