//! Typed attribute records consumed by the tile engine.
//!
//! Attribute sets are produced by an upstream tokenizer and handed to this
//! crate already decoded. Field names in the serialized form are the
//! standard DICOM keywords (`TotalPixelMatrixColumns`, `InstanceNumber`, ...)
//! so that sidecar records can be written by any DICOM toolkit.
//!
//! Every field is optional. Rules that depend on a field document what
//! happens when it is absent.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AttributeError;

/// How much of a file's attributes the caller needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeScope {
    /// Only the fields used for sibling grouping.
    Grouping,
    /// Everything, including per-frame records and the pixel data offset.
    Full,
}

/// Attribute records of one container file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AttributeSet {
    #[serde(rename = "TransferSyntaxUID")]
    pub transfer_syntax_uid: Option<String>,

    #[serde(rename = "SOPInstanceUID")]
    pub sop_instance_uid: Option<String>,

    pub instance_number: Option<i64>,
    pub series_number: Option<i64>,
    pub acquisition_date: Option<String>,
    pub acquisition_time: Option<String>,

    /// Specimen identifier ("ContainerIdentifier" in slide microscopy).
    #[serde(rename = "ContainerIdentifier")]
    pub specimen_id: Option<String>,

    /// Tile height in pixels.
    pub rows: Option<u32>,
    /// Tile width in pixels.
    pub columns: Option<u32>,
    pub total_pixel_matrix_columns: Option<u32>,
    pub total_pixel_matrix_rows: Option<u32>,
    pub total_pixel_matrix_focal_planes: Option<u32>,

    pub number_of_frames: Option<u32>,
    pub concatenation_frame_offset_number: Option<u32>,

    pub samples_per_pixel: Option<u16>,
    pub bits_allocated: Option<u16>,
    pub pixel_representation: Option<u16>,
    pub planar_configuration: Option<u16>,
    pub photometric_interpretation: Option<String>,
    pub window_center: Option<f64>,
    pub window_width: Option<f64>,

    /// `TILED_FULL` or `TILED_SPARSE`.
    pub dimension_organization_type: Option<String>,

    /// Identifiers from the optical path sequence, in sequence order.
    #[serde(rename = "OpticalPathIdentifiers")]
    pub optical_paths: Vec<String>,

    /// Per-frame functional group records, in frame order.
    #[serde(rename = "PerFrameFunctionalGroups")]
    pub frames: Vec<FrameAttributes>,

    /// Absolute file offset of the first byte of the pixel data value.
    #[serde(rename = "PixelDataOffset")]
    pub pixel_data_offset: Option<u64>,

    /// Records of a directory index file.
    #[serde(rename = "DirectoryRecordSequence")]
    pub directory_records: Vec<DirectoryRecord>,
}

impl AttributeSet {
    /// Restrict the set to what `scope` asks for.
    pub fn project(self, scope: AttributeScope) -> Self {
        match scope {
            AttributeScope::Full => self,
            AttributeScope::Grouping => AttributeSet {
                sop_instance_uid: self.sop_instance_uid,
                instance_number: self.instance_number,
                series_number: self.series_number,
                acquisition_date: self.acquisition_date,
                acquisition_time: self.acquisition_time,
                specimen_id: self.specimen_id,
                ..AttributeSet::default()
            },
        }
    }

    /// Whether the file declares the regular, gap-free tiling.
    pub fn is_tiled_full(&self) -> bool {
        self.dimension_organization_type
            .as_deref()
            .map(|t| t.trim().eq_ignore_ascii_case("TILED_FULL"))
            .unwrap_or(false)
    }

    /// Whether per-frame records carry tile positions.
    pub fn has_frame_positions(&self) -> bool {
        self.frames.iter().any(|f| f.position().is_some())
    }

    /// Declared frame count (1 when absent).
    pub fn frame_count(&self) -> u32 {
        self.number_of_frames.unwrap_or(1)
    }
}

/// Per-frame attributes of one frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FrameAttributes {
    /// 1-based column of the tile's top-left pixel.
    #[serde(rename = "ColumnPositionInTotalImagePixelMatrix")]
    pub column_position: Option<u32>,

    /// 1-based row of the tile's top-left pixel.
    #[serde(rename = "RowPositionInTotalImagePixelMatrix")]
    pub row_position: Option<u32>,

    #[serde(rename = "ZOffsetInSlideCoordinateSystem")]
    pub z_offset: Option<f64>,

    #[serde(rename = "OpticalPathIdentifier")]
    pub optical_path: Option<String>,
}

impl FrameAttributes {
    /// Zero-based (x, y) of the tile, if both positions are declared.
    pub fn position(&self) -> Option<(u32, u32)> {
        match (self.column_position, self.row_position) {
            (Some(col), Some(row)) => Some((col.saturating_sub(1), row.saturating_sub(1))),
            _ => None,
        }
    }
}

/// One record of a directory index.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryRecord {
    /// `PATIENT`, `STUDY`, `SERIES`, `IMAGE`, ...
    #[serde(rename = "DirectoryRecordType")]
    pub record_type: String,

    /// Relative path with `\` or `/` separators.
    #[serde(rename = "ReferencedFileID")]
    pub referenced_file_id: Option<String>,
}

/// Upstream collaborator that supplies decoded attributes for a file.
#[async_trait]
pub trait AttributeSource: Send + Sync {
    /// Read the attributes of `path`.
    ///
    /// # Errors
    /// Returns `AttributeError::Missing` when the file has no attribute
    /// records, and `AttributeError::Parse` when they cannot be decoded.
    async fn read_attributes(
        &self,
        path: &Path,
        scope: AttributeScope,
    ) -> Result<AttributeSet, AttributeError>;
}
