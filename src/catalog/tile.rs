//! Tile descriptors and the per-series tile catalog.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::dicom::Codec;

use super::geometry::SeriesGeometry;

// =============================================================================
// Region
// =============================================================================

/// Integer rectangle in canvas pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Overlap of two rectangles, or `None` if they do not overlap.
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x as u64 || bottom <= y as u64 {
            return None;
        }
        Some(Region::new(x, y, (right - x as u64) as u32, (bottom - y as u64) as u32))
    }

    pub fn intersects(&self, other: &Region) -> bool {
        self.intersection(other).is_some()
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Region) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

// =============================================================================
// Depth Key
// =============================================================================

/// Opaque focal coordinate of a tile.
///
/// Sources supply either sequential plane indices or physical focal
/// offsets. Keys are matched by equality; the ordering exists only to sort
/// the distinct set deterministically.
#[derive(Debug, Clone, Copy, Serialize)]
pub enum DepthKey {
    Index(u32),
    Offset(f64),
}

impl PartialEq for DepthKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DepthKey {}

impl PartialOrd for DepthKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DepthKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DepthKey::Index(a), DepthKey::Index(b)) => a.cmp(b),
            (DepthKey::Offset(a), DepthKey::Offset(b)) => a.total_cmp(b),
            (DepthKey::Index(_), DepthKey::Offset(_)) => Ordering::Less,
            (DepthKey::Offset(_), DepthKey::Index(_)) => Ordering::Greater,
        }
    }
}

// =============================================================================
// Tile Descriptor
// =============================================================================

/// Byte range state of a tile.
#[derive(Debug, Clone, PartialEq)]
pub enum TileExtent {
    /// Not yet resolved.
    Pending,
    /// Half-open range `[offset, end)` inside the source file.
    Resolved { offset: u64, end: u64 },
    /// Offset resolution failed; the tile is skipped on reads.
    Unlocated { reason: String },
    /// The codec has no decoder.
    Unsupported,
}

impl TileExtent {
    pub fn is_resolved(&self) -> bool {
        matches!(self, TileExtent::Resolved { .. })
    }
}

/// One independently decodable unit of pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDescriptor {
    /// Nominal tile rectangle. Edge tiles are not clipped to the canvas.
    pub region: Region,
    pub source_file: Arc<Path>,
    /// Index of `source_file` in the series file list.
    pub file_index: usize,
    /// Physical frame number inside `source_file`.
    pub frame_index: u32,
    pub extent: TileExtent,
    pub channel: u32,
    pub depth: DepthKey,
    pub codec: Codec,
    pub is_last_in_file: bool,
}

// =============================================================================
// Tile Catalog
// =============================================================================

/// How tile positions were derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogMode {
    /// Positions come from per-frame records.
    Explicit,
    /// Positions follow the regular grid frame numbering.
    Regular,
}

/// One file contributing tiles to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogFile {
    pub path: Arc<Path>,
    /// Absolute offset of the pixel data value.
    pub pixel_data_offset: Option<u64>,
    /// Declared number of physical frames.
    pub frame_count: u32,
}

/// Index of all tiles of one series.
#[derive(Debug, Clone)]
pub struct TileCatalog {
    files: Vec<CatalogFile>,
    tiles: Vec<TileDescriptor>,
    depths: Vec<DepthKey>,
    channels: u32,
    mode: CatalogMode,
    geometry: SeriesGeometry,
}

impl TileCatalog {
    pub(crate) fn new(
        files: Vec<CatalogFile>,
        tiles: Vec<TileDescriptor>,
        depths: Vec<DepthKey>,
        channels: u32,
        mode: CatalogMode,
        geometry: SeriesGeometry,
    ) -> Self {
        Self {
            files,
            tiles,
            depths,
            channels: channels.max(1),
            mode,
            geometry,
        }
    }

    /// Files that contributed tiles, in series order.
    pub fn files(&self) -> &[CatalogFile] {
        &self.files
    }

    /// Tiles in catalog order.
    pub fn tiles(&self) -> &[TileDescriptor] {
        &self.tiles
    }

    pub(crate) fn tiles_mut(&mut self) -> &mut [TileDescriptor] {
        &mut self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Sorted distinct depth keys.
    pub fn depths(&self) -> &[DepthKey] {
        &self.depths
    }

    pub fn depth_count(&self) -> usize {
        self.depths.len().max(1)
    }

    pub fn channel_count(&self) -> u32 {
        self.channels
    }

    pub fn mode(&self) -> CatalogMode {
        self.mode
    }

    pub fn geometry(&self) -> &SeriesGeometry {
        &self.geometry
    }

    /// Indices of the tiles of plane (z, c) that intersect `region`, in
    /// catalog order.
    ///
    /// When there are as many distinct depths as tiles, `z` selects the tile
    /// at that position. Otherwise a tile matches when its depth equals the
    /// `z`th distinct depth. The channel is ignored for single-channel
    /// series.
    pub fn tiles_for_plane(&self, z: usize, channel: u32, region: &Region) -> Vec<usize> {
        let single_channel = self.channels <= 1;
        let channel_ok = |tile: &TileDescriptor| single_channel || tile.channel == channel;

        if self.depths.len() == self.tiles.len() {
            return self
                .tiles
                .get(z)
                .filter(|tile| channel_ok(tile) && tile.region.intersects(region))
                .map(|_| vec![z])
                .unwrap_or_default();
        }

        let depth = match self.depths.get(z) {
            Some(depth) => *depth,
            None => return Vec::new(),
        };

        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| {
                tile.depth == depth && channel_ok(tile) && tile.region.intersects(region)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of tiles whose byte range was resolved.
    pub fn resolved_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.extent.is_resolved()).count()
    }
}
