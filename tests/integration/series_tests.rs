//! Sibling file resolution integration tests.
//!
//! Tests verify:
//! - Grouping of same-series files in instance order
//! - Exclusion of files with mismatched grouping attributes
//! - Single-file fallbacks
//! - DICOMDIR-driven file lists

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use dicom_tile_reader::dicom::{AttributeScope, AttributeSource, DirectoryRecord};
use dicom_tile_reader::error::IoError;
use dicom_tile_reader::io::FileSource;
use dicom_tile_reader::series::resolve_series;
use dicom_tile_reader::{ReaderConfig, SeriesFileList, SeriesHandle};

use super::test_utils::{
    container, grouping_attributes, raw_frames, tiled_attributes, MemoryReader, MemoryStore,
    EXPLICIT_LE,
};

async fn resolve(store: &MemoryStore, path: &str, config: &ReaderConfig) -> SeriesFileList {
    let opened = store
        .read_attributes(Path::new(path), AttributeScope::Full)
        .await
        .unwrap();
    resolve_series(store, store, Path::new(path), &opened, config)
        .await
        .unwrap()
}

fn paths(list: &[&str]) -> Vec<PathBuf> {
    list.iter().map(PathBuf::from).collect()
}

/// Files A, B, C of one series (instances 1-3) and D with another specimen.
fn four_file_store() -> MemoryStore {
    let pixels = container(&raw_frames(&[1], 4));
    MemoryStore::new()
        .with_file("/slide/c.dcm", pixels.clone(), grouping_attributes(3, "S-1"))
        .with_file("/slide/a.dcm", pixels.clone(), grouping_attributes(1, "S-1"))
        .with_file("/slide/d.dcm", pixels.clone(), grouping_attributes(4, "S-2"))
        .with_file("/slide/b.dcm", pixels, grouping_attributes(2, "S-1"))
}

// =============================================================================
// Grouping
// =============================================================================

#[tokio::test]
async fn test_siblings_grouped_in_instance_order() {
    let store = four_file_store();
    let list = resolve(&store, "/slide/b.dcm", &ReaderConfig::default()).await;

    assert_eq!(
        list.files(),
        paths(&["/slide/a.dcm", "/slide/b.dcm", "/slide/c.dcm"]).as_slice()
    );
}

#[tokio::test]
async fn test_grouping_is_independent_of_opened_file() {
    let store = four_file_store();
    let config = ReaderConfig::default();

    let from_a = resolve(&store, "/slide/a.dcm", &config).await;
    let from_c = resolve(&store, "/slide/c.dcm", &config).await;
    assert_eq!(from_a.files(), from_c.files());
}

#[tokio::test]
async fn test_series_number_check_can_be_disabled() {
    let mut other_series = grouping_attributes(2, "S-1");
    other_series.series_number = Some(9);
    let pixels = container(&raw_frames(&[1], 4));
    let store = MemoryStore::new()
        .with_file("/slide/a.dcm", pixels.clone(), grouping_attributes(1, "S-1"))
        .with_file("/slide/b.dcm", pixels, other_series);

    let strict = resolve(&store, "/slide/a.dcm", &ReaderConfig::default()).await;
    assert_eq!(strict.len(), 1);

    let relaxed = ReaderConfig {
        check_series_number: false,
        ..Default::default()
    };
    let list = resolve(&store, "/slide/a.dcm", &relaxed).await;
    assert_eq!(list.len(), 2);
}

#[tokio::test]
async fn test_time_tolerance_excludes_late_acquisitions() {
    let mut late = grouping_attributes(2, "S-1");
    late.acquisition_time = Some("102000".to_string());
    let pixels = container(&raw_frames(&[1], 4));
    let store = MemoryStore::new()
        .with_file("/slide/a.dcm", pixels.clone(), grouping_attributes(1, "S-1"))
        .with_file("/slide/b.dcm", pixels, late);

    let list = resolve(&store, "/slide/a.dcm", &ReaderConfig::default()).await;
    assert_eq!(list.files(), paths(&["/slide/a.dcm"]).as_slice());
}

#[tokio::test]
async fn test_other_extensions_and_sidecars_ignored() {
    let pixels = container(&raw_frames(&[1], 4));
    let store = MemoryStore::new()
        .with_file("/slide/a.dcm", pixels.clone(), grouping_attributes(1, "S-1"))
        .with_file("/slide/b.img", pixels.clone(), grouping_attributes(2, "S-1"))
        .with_file("/slide/a.dcm.json", pixels, grouping_attributes(3, "S-1"));

    let list = resolve(&store, "/slide/a.dcm", &ReaderConfig::default()).await;
    assert_eq!(list.len(), 1);
}

// =============================================================================
// Single-File Fallbacks
// =============================================================================

#[tokio::test]
async fn test_grouping_disabled() {
    let store = four_file_store();
    let config = ReaderConfig {
        group_files: false,
        ..Default::default()
    };
    let list = resolve(&store, "/slide/b.dcm", &config).await;
    assert_eq!(list.files(), paths(&["/slide/b.dcm"]).as_slice());
}

#[tokio::test]
async fn test_parent_directory_search_finds_sibling_directories() {
    let pixels = container(&raw_frames(&[1], 4));
    let store = MemoryStore::new()
        .with_file("/scan/run1/a.dcm", pixels.clone(), grouping_attributes(1, "S-1"))
        .with_file("/scan/run2/b.dcm", pixels, grouping_attributes(2, "S-1"));

    let list = resolve(&store, "/scan/run1/a.dcm", &ReaderConfig::default()).await;
    assert_eq!(list.files(), paths(&["/scan/run1/a.dcm"]).as_slice());

    let config = ReaderConfig {
        search_parent_directory: true,
        ..Default::default()
    };
    let list = resolve(&store, "/scan/run1/a.dcm", &config).await;
    assert_eq!(
        list.files(),
        paths(&["/scan/run1/a.dcm", "/scan/run2/b.dcm"]).as_slice()
    );
}

#[tokio::test]
async fn test_manifest_lists_grandparent_files_as_companions() {
    let pixels = container(&raw_frames(&[1], 4));
    let store = MemoryStore::new()
        .with_file("/scan/run1/a.dcm", pixels, grouping_attributes(1, "S-1"))
        .with_plain_file("/scan/run1.mif", b"manifest".to_vec())
        .with_plain_file("/scan/notes.txt", b"notes".to_vec());

    let list = resolve(&store, "/scan/run1/a.dcm", &ReaderConfig::default()).await;
    assert_eq!(list.files(), paths(&["/scan/run1/a.dcm"]).as_slice());
    assert_eq!(
        list.companions(),
        paths(&["/scan/notes.txt", "/scan/run1.mif"]).as_slice()
    );
}

#[tokio::test]
async fn test_no_manifest_no_companions() {
    let store = four_file_store();
    let list = resolve(&store, "/slide/a.dcm", &ReaderConfig::default()).await;
    assert!(list.companions().is_empty());
}

/// Store whose directories cannot be listed.
struct UnlistableStore(MemoryStore);

#[async_trait]
impl FileSource for UnlistableStore {
    type Reader = MemoryReader;

    async fn create_reader(&self, path: &Path) -> Result<MemoryReader, IoError> {
        self.0.create_reader(path).await
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, IoError> {
        Err(IoError::NotFound(dir.display().to_string()))
    }

    async fn list_directories(&self, dir: &Path) -> Result<Vec<PathBuf>, IoError> {
        Err(IoError::NotFound(dir.display().to_string()))
    }
}

#[tokio::test]
async fn test_listing_failure_opens_single_file() {
    let store = four_file_store();
    let opened = store
        .read_attributes(Path::new("/slide/b.dcm"), AttributeScope::Full)
        .await
        .unwrap();

    let list = resolve_series(
        &UnlistableStore(store.clone()),
        &store,
        Path::new("/slide/b.dcm"),
        &opened,
        &ReaderConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(list.files(), paths(&["/slide/b.dcm"]).as_slice());
}

#[tokio::test]
async fn test_huge_instance_number_keeps_order() {
    let pixels = container(&raw_frames(&[1], 4));
    let store = MemoryStore::new()
        .with_file("/slide/a.dcm", pixels.clone(), grouping_attributes(1, "S-1"))
        .with_file("/slide/z.dcm", pixels, grouping_attributes(2_000_000_000, "S-1"));

    let list = resolve(&store, "/slide/a.dcm", &ReaderConfig::default()).await;
    assert_eq!(
        list.files(),
        paths(&["/slide/a.dcm", "/slide/z.dcm"]).as_slice()
    );
}

#[tokio::test]
async fn test_missing_acquisition_time_opens_single_file() {
    let mut opened = grouping_attributes(1, "S-1");
    opened.acquisition_time = None;
    let pixels = container(&raw_frames(&[1], 4));
    let store = MemoryStore::new()
        .with_file("/slide/a.dcm", pixels.clone(), opened)
        .with_file("/slide/b.dcm", pixels, grouping_attributes(2, "S-1"));

    let list = resolve(&store, "/slide/a.dcm", &ReaderConfig::default()).await;
    assert_eq!(list.files(), paths(&["/slide/a.dcm"]).as_slice());
}

// =============================================================================
// Directory Index
// =============================================================================

fn record(kind: &str, file: Option<&str>) -> DirectoryRecord {
    DirectoryRecord {
        record_type: kind.to_string(),
        referenced_file_id: file.map(str::to_string),
    }
}

#[tokio::test]
async fn test_directory_index_seeds_file_list() {
    let index = dicom_tile_reader::AttributeSet {
        directory_records: vec![
            record("PATIENT", None),
            record("STUDY", None),
            record("SERIES", None),
            record("IMAGE", Some("IMG\\A")),
            record("IMAGE", Some("IMG/B")),
            record("SR DOCUMENT", Some("DOCS\\R")),
        ],
        ..Default::default()
    };

    let mut second = tiled_attributes(4, 4, 4, 1, EXPLICIT_LE);
    second.instance_number = Some(2);
    let store = MemoryStore::new()
        .with_file("/study/DICOMDIR", Vec::new(), index)
        .with_file(
            "/study/IMG/A",
            container(&raw_frames(&[5], 4)),
            tiled_attributes(4, 4, 4, 1, EXPLICIT_LE),
        )
        .with_file("/study/IMG/B", container(&raw_frames(&[6], 4)), second)
        .with_plain_file("/study/DOCS/R", vec![0; 8]);

    let series = SeriesHandle::open(
        store.clone(),
        &store,
        "/study/DICOMDIR",
        &ReaderConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(
        series.list_files(),
        paths(&["/study/IMG/A", "/study/IMG/B"]).as_slice()
    );
    assert!(series
        .companion_files()
        .contains(&PathBuf::from("/study/DICOMDIR")));
    assert!(series
        .companion_files()
        .contains(&PathBuf::from("/study/DOCS/R")));

    // one frame per file, stacked as two focal planes
    assert_eq!(series.plane_count(), 2);
    let first = series.open_plane(0, 0, 0, 4, 4).await.unwrap();
    let second = series.open_plane(1, 0, 0, 4, 4).await.unwrap();
    assert_eq!(first, vec![5; 16]);
    assert_eq!(second, vec![6; 16]);

    let used = series.used_files();
    assert_eq!(used[0], PathBuf::from("/study/IMG/A"));
    assert_eq!(used.len(), 4);
}

#[tokio::test]
async fn test_empty_directory_index_fails() {
    let index = dicom_tile_reader::AttributeSet {
        directory_records: vec![record("SERIES", None)],
        ..Default::default()
    };
    let store = MemoryStore::new().with_file("/study/DICOMDIR", Vec::new(), index);

    let result = SeriesHandle::open(
        store.clone(),
        &store,
        "/study/DICOMDIR",
        &ReaderConfig::default(),
    )
    .await;
    assert!(result.is_err());
}
