//! Series geometry and pixel type derived from a file's attributes.

use serde::Serialize;

use crate::codec::PixelLayout;
use crate::dicom::{classify, AttributeSet, ByteOrder, Codec};
use crate::error::CatalogError;

/// Photometric interpretation where stored 0 is maximal brightness.
pub const MONOCHROME1: &str = "MONOCHROME1";

/// Canvas, tile and sample layout shared by all files of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesGeometry {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub samples_per_pixel: u16,
    pub bytes_per_sample: usize,
    pub signed: bool,
    pub byte_order: ByteOrder,
    /// Uncompressed samples are stored one sample plane after another.
    pub planar_storage: bool,
    pub codec: Codec,
    pub photometric: String,
    pub window_center: Option<f64>,
    pub window_width: Option<f64>,
}

impl SeriesGeometry {
    /// Derive the geometry of a file.
    ///
    /// # Errors
    /// Returns `CatalogError::InvalidGeometry` when the tile size is zero or
    /// missing.
    pub fn from_attributes(attrs: &AttributeSet) -> Result<Self, CatalogError> {
        let tile_width = attrs.columns.unwrap_or(0);
        let tile_height = attrs.rows.unwrap_or(0);
        if tile_width == 0 || tile_height == 0 {
            return Err(CatalogError::InvalidGeometry(format!(
                "tile size {}x{}",
                tile_width, tile_height
            )));
        }

        let width = attrs
            .total_pixel_matrix_columns
            .filter(|&w| w > 0)
            .unwrap_or(tile_width);
        let height = attrs
            .total_pixel_matrix_rows
            .filter(|&h| h > 0)
            .unwrap_or(tile_height);

        let mut samples_per_pixel = attrs.samples_per_pixel.unwrap_or(1).max(1);
        let bits = attrs.bits_allocated.unwrap_or(8).max(1);
        let bytes_per_sample = match bits {
            24 => {
                samples_per_pixel = 3;
                1
            }
            48 => {
                samples_per_pixel = 3;
                2
            }
            bits => (bits as usize).div_ceil(8),
        };

        let (codec, byte_order) = classify(attrs.transfer_syntax_uid.as_deref());

        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
            samples_per_pixel,
            bytes_per_sample,
            signed: attrs.pixel_representation == Some(1),
            byte_order,
            planar_storage: attrs.planar_configuration == Some(1),
            codec,
            photometric: attrs
                .photometric_interpretation
                .as_deref()
                .map(|p| p.trim().to_ascii_uppercase())
                .unwrap_or_else(|| "MONOCHROME2".to_string()),
            window_center: attrs.window_center,
            window_width: attrs.window_width,
        })
    }

    /// Tiles per row of the grid.
    pub fn tiles_x(&self) -> u32 {
        self.width.div_ceil(self.tile_width)
    }

    /// Tiles per column of the grid.
    pub fn tiles_y(&self) -> u32 {
        self.height.div_ceil(self.tile_height)
    }

    /// Uncompressed size of one tile.
    pub fn frame_bytes(&self) -> u64 {
        self.tile_width as u64
            * self.tile_height as u64
            * self.samples_per_pixel as u64
            * self.bytes_per_sample as u64
    }

    /// Bytes of one decoded plane of `width x height` pixels.
    pub fn plane_bytes(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.samples_per_pixel as usize * self.bytes_per_sample
    }

    /// Layout in which the tile decoder naturally produces samples.
    pub fn native_layout(&self) -> PixelLayout {
        if self.samples_per_pixel == 1 {
            return PixelLayout::Interleaved;
        }
        match self.codec {
            Codec::Rle | Codec::Jpeg2000 => PixelLayout::Planar,
            Codec::Raw if self.planar_storage => PixelLayout::Planar,
            _ => PixelLayout::Interleaved,
        }
    }

    /// Whether samples must be inverted for display.
    pub fn is_inverted(&self) -> bool {
        self.photometric == MONOCHROME1
    }

    /// Whether the photometric interpretation is a YCbCr variant.
    pub fn is_ycbcr(&self) -> bool {
        self.photometric.starts_with("YBR")
    }

    /// Whether `other` can share a catalog with `self`.
    pub fn is_compatible(&self, other: &SeriesGeometry) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.tile_width == other.tile_width
            && self.tile_height == other.tile_height
            && self.samples_per_pixel == other.samples_per_pixel
            && self.bytes_per_sample == other.bytes_per_sample
            && self.codec == other.codec
    }
}
