//! Test utilities for integration tests.
//!
//! This module provides an in-memory file store and helpers for building
//! DICOM-like container files with known pixel data.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, Luma};

use dicom_tile_reader::codec::rle::encode_frame_with_header;
use dicom_tile_reader::dicom::{AttributeScope, AttributeSet, AttributeSource, FrameAttributes};
use dicom_tile_reader::error::{AttributeError, IoError};
use dicom_tile_reader::io::{FileSource, RangeReader};

// =============================================================================
// Transfer Syntaxes
// =============================================================================

pub const EXPLICIT_LE: &str = "1.2.840.10008.1.2.1";
pub const RLE_LOSSLESS: &str = "1.2.840.10008.1.2.5";
pub const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";
pub const DEFLATE: &str = "1.2.840.10008.1.2.1.99";

/// Size of the fake header in front of the pixel data.
pub const HEADER_LEN: u64 = 132;

// =============================================================================
// Memory Reader
// =============================================================================

/// Range reader over an in-memory buffer that counts read calls.
pub struct MemoryReader {
    data: Bytes,
    identifier: String,
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl RangeReader for MemoryReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let start = offset as usize;
        if start + len > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..start + len))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory files with attached attribute sets.
#[derive(Clone, Default)]
pub struct MemoryStore {
    files: Arc<BTreeMap<PathBuf, Bytes>>,
    attributes: Arc<BTreeMap<PathBuf, AttributeSet>>,
    reads: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file with contents and attributes.
    pub fn with_file(
        mut self,
        path: impl Into<PathBuf>,
        data: Vec<u8>,
        attrs: AttributeSet,
    ) -> Self {
        let path = path.into();
        Arc::make_mut(&mut self.files).insert(path.clone(), Bytes::from(data));
        Arc::make_mut(&mut self.attributes).insert(path, attrs);
        self
    }

    /// Add a file that has contents but no attributes.
    pub fn with_plain_file(mut self, path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        Arc::make_mut(&mut self.files).insert(path.into(), Bytes::from(data));
        self
    }

    /// Number of range reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of readers created so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSource for MemoryStore {
    type Reader = MemoryReader;

    async fn create_reader(&self, path: &Path) -> Result<MemoryReader, IoError> {
        let data = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| IoError::NotFound(path.display().to_string()))?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryReader {
            data,
            identifier: path.display().to_string(),
            reads: Arc::clone(&self.reads),
        })
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, IoError> {
        Ok(self
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }

    async fn list_directories(&self, dir: &Path) -> Result<Vec<PathBuf>, IoError> {
        let mut dirs = BTreeSet::new();
        for path in self.files.keys() {
            for ancestor in path.ancestors().skip(1) {
                if ancestor.parent() == Some(dir) {
                    dirs.insert(ancestor.to_path_buf());
                }
            }
        }
        Ok(dirs.into_iter().collect())
    }
}

#[async_trait]
impl AttributeSource for MemoryStore {
    async fn read_attributes(
        &self,
        path: &Path,
        scope: AttributeScope,
    ) -> Result<AttributeSet, AttributeError> {
        self.attributes
            .get(path)
            .cloned()
            .map(|attrs| attrs.project(scope))
            .ok_or_else(|| AttributeError::Missing(path.to_path_buf()))
    }
}

// =============================================================================
// Attribute Fixtures
// =============================================================================

/// Attributes of a TILED_FULL 8-bit grayscale image.
pub fn tiled_attributes(
    width: u32,
    height: u32,
    tile: u32,
    frames: u32,
    transfer_syntax: &str,
) -> AttributeSet {
    AttributeSet {
        transfer_syntax_uid: Some(transfer_syntax.to_string()),
        sop_instance_uid: Some("1.2.826.0.1.3680043.9.1.1.1".to_string()),
        instance_number: Some(1),
        series_number: Some(3),
        acquisition_date: Some("20240115".to_string()),
        acquisition_time: Some("101500".to_string()),
        specimen_id: Some("S-1".to_string()),
        rows: Some(tile),
        columns: Some(tile),
        total_pixel_matrix_columns: Some(width),
        total_pixel_matrix_rows: Some(height),
        number_of_frames: Some(frames),
        samples_per_pixel: Some(1),
        bits_allocated: Some(8),
        pixel_representation: Some(0),
        photometric_interpretation: Some("MONOCHROME2".to_string()),
        dimension_organization_type: Some("TILED_FULL".to_string()),
        pixel_data_offset: Some(HEADER_LEN),
        ..Default::default()
    }
}

/// Attributes for a sibling-grouping candidate.
pub fn grouping_attributes(instance: i64, specimen: &str) -> AttributeSet {
    AttributeSet {
        instance_number: Some(instance),
        sop_instance_uid: Some(format!("1.2.826.0.1.3680043.9.1.1.{}", instance)),
        specimen_id: Some(specimen.to_string()),
        ..tiled_attributes(4, 4, 4, 1, EXPLICIT_LE)
    }
}

/// Per-frame record with a 1-based tile position.
pub fn positioned_frame(column: u32, row: u32) -> FrameAttributes {
    FrameAttributes {
        column_position: Some(column),
        row_position: Some(row),
        ..Default::default()
    }
}

// =============================================================================
// Pixel Data Fixtures
// =============================================================================

/// Prefix `pixel_data` with a fake header of `HEADER_LEN` bytes.
pub fn container(pixel_data: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 128];
    data.extend_from_slice(b"DICM");
    data.extend_from_slice(pixel_data);
    data
}

/// Uncompressed frames, each filled with one value.
pub fn raw_frames(values: &[u8], tile: u32) -> Vec<u8> {
    let size = (tile * tile) as usize;
    values
        .iter()
        .flat_map(|&v| std::iter::repeat(v).take(size))
        .collect()
}

fn item(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFE, 0xFF, 0x00, 0xE0];
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Encapsulated pixel data: empty offset table, one item per frame, then
/// the sequence delimiter.
pub fn encapsulated(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut out = item(&[]);
    for frame in frames {
        let mut payload = frame.clone();
        if payload.len() % 2 == 1 {
            payload.push(0);
        }
        out.extend(item(&payload));
    }
    out.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0, 0, 0, 0]);
    out
}

/// RLE pixel data for 8-bit grayscale frames.
pub fn rle_frames(frames: &[Vec<u8>]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = frames
        .iter()
        .map(|f| encode_frame_with_header(&[f.clone()]))
        .collect();
    encapsulated(&encoded)
}

/// Gray JPEG tile with every pixel set to `value`.
pub fn gray_jpeg(size: u32, value: u8) -> Vec<u8> {
    let img = GrayImage::from_pixel(size, size, Luma([value]));
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 100)
        .encode_image(&img)
        .expect("JPEG encoding");
    out
}

/// Tile values 10 * y + x, so every pixel of a frame is distinct.
pub fn gradient_tile(tile: u32, base: u8) -> Vec<u8> {
    (0..tile)
        .flat_map(|y| (0..tile).map(move |x| base + (10 * y + x) as u8))
        .collect()
}
