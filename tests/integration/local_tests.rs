//! Local filesystem integration tests.
//!
//! Tests verify:
//! - Series open from files with JSON attribute sidecars
//! - Sibling grouping over a real directory
//! - Files opened by a path relative to the working directory
//! - Missing sidecars are reported as open errors

use std::path::{Path, PathBuf};

use dicom_tile_reader::error::{AttributeError, CatalogError};
use dicom_tile_reader::{open_series, AttributeSet, ReaderConfig};

use super::test_utils::{container, raw_frames, tiled_attributes, EXPLICIT_LE};

fn write_image(dir: &Path, name: &str, pixels: &[u8], attrs: &AttributeSet) {
    let path = dir.join(name);
    std::fs::write(&path, container(pixels)).unwrap();
    let sidecar = dir.join(format!("{}.json", name));
    std::fs::write(sidecar, serde_json::to_vec_pretty(attrs).unwrap()).unwrap();
}

#[tokio::test]
async fn test_open_series_with_sidecars() {
    let dir = tempfile::tempdir().unwrap();
    let attrs = tiled_attributes(8, 8, 4, 4, EXPLICIT_LE);
    write_image(dir.path(), "level.dcm", &raw_frames(&[10, 20, 30, 40], 4), &attrs);

    let series = open_series(dir.path().join("level.dcm"), &ReaderConfig::default())
        .await
        .unwrap();

    assert_eq!(series.list_files().len(), 1);
    let samples = series.open_plane(0, 2, 2, 4, 4).await.unwrap();
    assert_eq!(
        samples,
        vec![10, 10, 20, 20, 10, 10, 20, 20, 30, 30, 40, 40, 30, 30, 40, 40]
    );
}

#[tokio::test]
async fn test_local_siblings_grouped() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = tiled_attributes(8, 8, 4, 2, EXPLICIT_LE);
    first.instance_number = Some(1);
    let mut second = tiled_attributes(8, 8, 4, 2, EXPLICIT_LE);
    second.instance_number = Some(2);
    second.sop_instance_uid = Some("1.2.826.0.1.3680043.9.1.1.2".to_string());

    write_image(dir.path(), "part-2.dcm", &raw_frames(&[30, 40], 4), &second);
    write_image(dir.path(), "part-1.dcm", &raw_frames(&[10, 20], 4), &first);

    let series = open_series(dir.path().join("part-2.dcm"), &ReaderConfig::default())
        .await
        .unwrap();

    assert_eq!(
        series.list_files(),
        &[dir.path().join("part-1.dcm"), dir.path().join("part-2.dcm")]
    );
    let samples = series.open_plane(0, 0, 4, 8, 1).await.unwrap();
    assert_eq!(samples, vec![30, 30, 30, 30, 40, 40, 40, 40]);
}

#[tokio::test]
async fn test_relative_path_groups_siblings() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = tiled_attributes(8, 8, 4, 2, EXPLICIT_LE);
    first.instance_number = Some(1);
    let mut second = tiled_attributes(8, 8, 4, 2, EXPLICIT_LE);
    second.instance_number = Some(2);
    second.sop_instance_uid = Some("1.2.826.0.1.3680043.9.1.1.2".to_string());

    write_image(dir.path(), "part-1.dcm", &raw_frames(&[10, 20], 4), &first);
    write_image(dir.path(), "part-2.dcm", &raw_frames(&[30, 40], 4), &second);

    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let opened = open_series("part-2.dcm", &ReaderConfig::default()).await;
    let result = match opened {
        Ok(series) => {
            let samples = series.open_plane(0, 0, 4, 8, 1).await;
            Ok((series.list_files().to_vec(), samples))
        }
        Err(e) => Err(e),
    };
    std::env::set_current_dir(previous).unwrap();

    let (files, samples) = result.unwrap();
    assert_eq!(
        files,
        vec![PathBuf::from("part-1.dcm"), PathBuf::from("part-2.dcm")]
    );
    assert_eq!(samples.unwrap(), vec![30, 30, 30, 30, 40, 40, 40, 40]);
}

#[tokio::test]
async fn test_missing_sidecar_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bare.dcm");
    std::fs::write(&path, container(&raw_frames(&[1], 4))).unwrap();

    let result = open_series(&path, &ReaderConfig::default()).await;
    assert!(matches!(
        result,
        Err(CatalogError::Attribute(AttributeError::Missing(_)))
    ));
}
