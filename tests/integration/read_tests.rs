//! Plane read integration tests.
//!
//! Tests verify:
//! - End-to-end reads of raw, RLE and JPEG series
//! - Compositing of reads that span several tiles
//! - MONOCHROME1 inversion
//! - Tolerance of missing and unreadable tiles
//! - Request validation errors

use dicom_tile_reader::error::{DecodeError, ReadError};
use dicom_tile_reader::{AttributeSet, PixelLayout, ReaderConfig, SeriesHandle};

use super::test_utils::{
    container, encapsulated, gradient_tile, gray_jpeg, positioned_frame, raw_frames, rle_frames,
    tiled_attributes, MemoryStore, DEFLATE, EXPLICIT_LE, JPEG_BASELINE, RLE_LOSSLESS,
};

async fn open_one(data: Vec<u8>, attrs: AttributeSet) -> SeriesHandle<MemoryStore> {
    let store = MemoryStore::new().with_file("/slide/a.dcm", data, attrs);
    SeriesHandle::open(store.clone(), &store, "/slide/a.dcm", &ReaderConfig::default())
        .await
        .unwrap()
}

/// 8x8 canvas of four 4x4 raw tiles with values 10, 20, 30, 40.
async fn quadrant_series() -> SeriesHandle<MemoryStore> {
    open_one(
        container(&raw_frames(&[10, 20, 30, 40], 4)),
        tiled_attributes(8, 8, 4, 4, EXPLICIT_LE),
    )
    .await
}

// =============================================================================
// End-to-End Reads
// =============================================================================

#[tokio::test]
async fn test_full_canvas_read_returns_quadrants() {
    let series = quadrant_series().await;
    let samples = series.open_plane(0, 0, 0, 8, 8).await.unwrap();

    for y in 0..8usize {
        for x in 0..8usize {
            let expected = match (x < 4, y < 4) {
                (true, true) => 10,
                (false, true) => 20,
                (true, false) => 30,
                (false, false) => 40,
            };
            assert_eq!(samples[y * 8 + x], expected, "pixel ({}, {})", x, y);
        }
    }
}

#[tokio::test]
async fn test_read_spanning_tiles_matches_single_tile_reads() {
    let frames: Vec<u8> = (0..4u8).flat_map(|i| gradient_tile(4, i * 50)).collect();
    let series = open_one(container(&frames), tiled_attributes(8, 8, 4, 4, EXPLICIT_LE)).await;

    let spanning = series.open_plane(0, 2, 1, 4, 3).await.unwrap();
    let left = series.open_plane(0, 2, 1, 2, 3).await.unwrap();
    let right = series.open_plane(0, 4, 1, 2, 3).await.unwrap();

    for row in 0..3 {
        assert_eq!(&spanning[row * 4..row * 4 + 2], &left[row * 2..row * 2 + 2]);
        assert_eq!(&spanning[row * 4 + 2..row * 4 + 4], &right[row * 2..row * 2 + 2]);
    }
    // pixel (2, 1) of tile 0 is 10 * 1 + 2
    assert_eq!(spanning[0], 12);
    // pixel (4, 1) is pixel (0, 1) of tile 1
    assert_eq!(spanning[2], 50 + 10);
}

#[tokio::test]
async fn test_edge_tiles_clipped_to_canvas() {
    // 6x6 canvas of 4x4 tiles: edge tiles extend past the canvas
    let series = open_one(
        container(&raw_frames(&[1, 2, 3, 4], 4)),
        tiled_attributes(6, 6, 4, 4, EXPLICIT_LE),
    )
    .await;

    let samples = series.open_plane(0, 3, 3, 3, 3).await.unwrap();
    assert_eq!(samples, vec![1, 2, 2, 3, 4, 4, 3, 4, 4]);
}

#[tokio::test]
async fn test_rle_series_read() {
    let frames: Vec<Vec<u8>> = (0..4u8).map(|i| gradient_tile(4, i * 60)).collect();
    let series = open_one(
        container(&rle_frames(&frames)),
        tiled_attributes(8, 8, 4, 4, RLE_LOSSLESS),
    )
    .await;

    let samples = series.open_plane(0, 0, 0, 8, 8).await.unwrap();
    // bottom-right pixel is pixel (3, 3) of frame 3
    assert_eq!(samples[63], 180 + 33);
    assert_eq!(samples[4], 60);
}

#[tokio::test]
async fn test_jpeg_series_read() {
    let pixel_data = encapsulated(&[gray_jpeg(8, 40), gray_jpeg(8, 220)]);
    let series = open_one(
        container(&pixel_data),
        tiled_attributes(16, 8, 8, 2, JPEG_BASELINE),
    )
    .await;

    let samples = series.open_plane(0, 0, 0, 16, 8).await.unwrap();
    for y in 0..8 {
        for x in 0..16 {
            let expected = if x < 8 { 40 } else { 220 };
            let actual = samples[y * 16 + x] as i32;
            assert!((actual - expected).abs() <= 2, "pixel ({}, {}) = {}", x, y, actual);
        }
    }
}

#[tokio::test]
async fn test_planar_output_layout() {
    let mut attrs = tiled_attributes(2, 1, 2, 1, EXPLICIT_LE);
    attrs.rows = Some(1);
    attrs.samples_per_pixel = Some(3);
    attrs.photometric_interpretation = Some("RGB".to_string());
    let store = MemoryStore::new().with_file(
        "/slide/a.dcm",
        container(&[1, 2, 3, 4, 5, 6]),
        attrs,
    );
    let config = ReaderConfig {
        layout: Some(PixelLayout::Planar),
        ..Default::default()
    };
    let series = SeriesHandle::open(store.clone(), &store, "/slide/a.dcm", &config)
        .await
        .unwrap();

    assert_eq!(series.layout(), PixelLayout::Planar);
    let samples = series.open_plane(0, 0, 0, 2, 1).await.unwrap();
    assert_eq!(samples, vec![1, 4, 2, 5, 3, 6]);
}

// =============================================================================
// Photometric Inversion
// =============================================================================

#[tokio::test]
async fn test_monochrome1_inverted_once() {
    let frames: Vec<Vec<u8>> = vec![gradient_tile(4, 0)];
    let mut attrs = tiled_attributes(4, 4, 4, 1, RLE_LOSSLESS);
    attrs.photometric_interpretation = Some("MONOCHROME1".to_string());
    let series = open_one(container(&rle_frames(&frames)), attrs).await;

    let expected: Vec<u8> = frames[0].iter().map(|v| 255 - v).collect();
    // the second read is served from the decoded tile cache
    let first = series.open_plane(0, 0, 0, 4, 4).await.unwrap();
    let second = series.open_plane(0, 0, 0, 4, 4).await.unwrap();
    assert_eq!(first, expected);
    assert_eq!(second, expected);
}

// =============================================================================
// Missing and Unreadable Tiles
// =============================================================================

#[tokio::test]
async fn test_missing_tile_leaves_buffer_unchanged() {
    // sparse 8x8 canvas with a single tile at the top left
    let mut attrs = tiled_attributes(8, 8, 4, 1, EXPLICIT_LE);
    attrs.dimension_organization_type = Some("TILED_SPARSE".to_string());
    attrs.frames = vec![positioned_frame(1, 1)];
    let series = open_one(container(&raw_frames(&[9], 4)), attrs).await;

    let mut buf = vec![0x7Fu8; 16];
    series
        .open_plane_into(0, &mut buf, 4, 4, 4, 4)
        .await
        .unwrap();
    assert_eq!(buf, vec![0x7F; 16]);

    series
        .open_plane_into(0, &mut buf, 2, 2, 4, 4)
        .await
        .unwrap();
    assert_eq!(&buf[0..4], &[9, 9, 0x7F, 0x7F]);
}

#[tokio::test]
async fn test_truncated_file_skips_tiles_past_the_end() {
    let mut data = container(&raw_frames(&[10, 20], 4));
    data.truncate(data.len() - 4);
    let series = open_one(data, tiled_attributes(8, 4, 4, 2, EXPLICIT_LE)).await;

    let samples = series.open_plane(0, 0, 0, 8, 4).await.unwrap();
    assert_eq!(&samples[0..4], &[10, 10, 10, 10]);
    assert_eq!(&samples[4..8], &[0, 0, 0, 0]);
}

#[tokio::test]
async fn test_unsupported_compression_fails_read() {
    let series = open_one(
        container(&[0; 64]),
        tiled_attributes(8, 8, 8, 1, DEFLATE),
    )
    .await;

    let result = series.open_plane(0, 0, 0, 8, 8).await;
    assert!(matches!(
        result,
        Err(ReadError::Decode(DecodeError::UnsupportedCompression(_)))
    ));
}

// =============================================================================
// Request Validation
// =============================================================================

#[tokio::test]
async fn test_request_validation() {
    let series = quadrant_series().await;

    assert!(matches!(
        series.open_plane(1, 0, 0, 4, 4).await,
        Err(ReadError::PlaneOutOfRange { plane: 1, count: 1 })
    ));
    assert!(matches!(
        series.open_plane(0, 6, 0, 4, 4).await,
        Err(ReadError::RegionOutOfBounds { .. })
    ));
    assert!(matches!(
        series.open_plane(0, 0, 0, 0, 4).await,
        Err(ReadError::RegionOutOfBounds { .. })
    ));

    let mut small = vec![0u8; 15];
    assert!(matches!(
        series.open_plane_into(0, &mut small, 0, 0, 4, 4).await,
        Err(ReadError::BufferTooSmall {
            required: 16,
            actual: 15
        })
    ));
}

#[tokio::test]
async fn test_clear_cache_keeps_reads_consistent() {
    let frames = vec![gradient_tile(4, 5)];
    let series = open_one(
        container(&rle_frames(&frames)),
        tiled_attributes(4, 4, 4, 1, RLE_LOSSLESS),
    )
    .await;

    let before = series.open_plane(0, 0, 0, 4, 4).await.unwrap();
    series.clear_cache().await;
    let after = series.open_plane(0, 0, 0, 4, 4).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(before, frames[0]);
}

#[tokio::test]
async fn test_metadata_summary() {
    let series = quadrant_series().await;
    let metadata = series.metadata();

    assert_eq!((metadata.width, metadata.height), (8, 8));
    assert_eq!(metadata.tiles, 4);
    assert_eq!(metadata.resolved_tiles, 4);
    assert_eq!(metadata.planes, 1);
    assert_eq!(metadata.layout, PixelLayout::Interleaved);

    let json = serde_json::to_value(&metadata).unwrap();
    assert_eq!(json["codec"], "raw");
    assert_eq!(json["mode"], "regular");
}

#[tokio::test]
async fn test_readers_scoped_to_each_read() {
    let store = MemoryStore::new().with_file(
        "/slide/a.dcm",
        container(&raw_frames(&[10, 20, 30, 40], 4)),
        tiled_attributes(8, 8, 4, 4, EXPLICIT_LE),
    );
    let series = SeriesHandle::open(store.clone(), &store, "/slide/a.dcm", &ReaderConfig::default())
        .await
        .unwrap();

    // raw offsets need no file access
    assert_eq!(store.open_count(), 0);

    series.open_plane(0, 0, 0, 8, 8).await.unwrap();
    assert_eq!(store.open_count(), 1);
    assert_eq!(store.read_count(), 4);

    series.open_plane(0, 0, 0, 2, 2).await.unwrap();
    assert_eq!(store.open_count(), 2);
    assert_eq!(store.read_count(), 5);
}
