//! Tile catalog construction.
//!
//! # Catalog Modes
//!
//! **Explicit**: per-frame records carry the tile's column and row in the
//! total pixel matrix (1-based) and the file does not declare `TILED_FULL`.
//! One tile is emitted per frame record with a position.
//!
//! **Regular**: tiles follow the linear frame numbering of the full grid.
//! Global frame `n` maps to
//!
//! ```text
//! x = (n mod tx) * tw
//! y = ((n / tx) mod ty) * th
//! z = (n / (tx * ty)) mod Z
//! c = n / (tx * ty * Z)
//! ```
//!
//! where `tx`, `ty` are the tiles per row and column, `Z` the focal plane
//! count, and `n` the file's starting frame plus the frame index. A
//! non-tiled multi-frame series is the case where the tile is the canvas.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dicom::AttributeSet;
use crate::error::CatalogError;

use super::geometry::SeriesGeometry;
use super::tile::{
    CatalogFile, CatalogMode, DepthKey, Region, TileCatalog, TileDescriptor, TileExtent,
};

/// Attributes of one file of the series.
#[derive(Debug, Clone)]
pub struct SeriesFile {
    pub path: PathBuf,
    pub attributes: AttributeSet,
}

impl SeriesFile {
    pub fn new(path: impl Into<PathBuf>, attributes: AttributeSet) -> Self {
        Self {
            path: path.into(),
            attributes,
        }
    }
}

fn mode_of(attrs: &AttributeSet) -> CatalogMode {
    if attrs.has_frame_positions() && !attrs.is_tiled_full() {
        CatalogMode::Explicit
    } else {
        CatalogMode::Regular
    }
}

/// Optical path identifiers in sequence order, then first appearance.
fn optical_paths(files: &[&SeriesFile]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let mut add = |id: &str| {
        let id = id.trim();
        if !id.is_empty() && !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    };

    for file in files {
        for id in &file.attributes.optical_paths {
            add(id);
        }
    }
    for file in files {
        for frame in &file.attributes.frames {
            if let Some(id) = frame.optical_path.as_deref() {
                add(id);
            }
        }
    }
    ids
}

/// Reconcile the detected channel count against the total frame count.
pub fn reconcile_channels(detected: usize, total_frames: u64) -> u32 {
    if detected == 0 {
        return 1;
    }
    if total_frames % detected as u64 != 0 {
        warn!(
            "Frame count {} is not divisible by {} optical paths; treating series as one channel",
            total_frames, detected
        );
        return 1;
    }
    detected as u32
}

/// Build the tile catalog of a series.
///
/// Files whose geometry, codec or catalog mode disagree with the first
/// usable file are skipped with a warning.
///
/// # Errors
/// - `CatalogError::NoUsableFiles` if no file has a usable geometry
/// - `CatalogError::NoFrames` if the usable files declare no tiles
pub fn build_catalog(files: &[SeriesFile]) -> Result<TileCatalog, CatalogError> {
    let mut first: Option<(SeriesGeometry, CatalogMode)> = None;
    let mut accepted: Vec<&SeriesFile> = Vec::new();

    for file in files {
        let geometry = match SeriesGeometry::from_attributes(&file.attributes) {
            Ok(geometry) => geometry,
            Err(e) => {
                warn!("Skipping {}: {}", file.path.display(), e);
                continue;
            }
        };
        let mode = mode_of(&file.attributes);

        match &first {
            None => {
                first = Some((geometry, mode));
                accepted.push(file);
            }
            Some((reference, reference_mode)) => {
                if reference.is_compatible(&geometry) && *reference_mode == mode {
                    accepted.push(file);
                } else {
                    warn!(
                        "Skipping {}: geometry or tiling differs from the first file",
                        file.path.display()
                    );
                }
            }
        }
    }

    let (geometry, mode) = first.ok_or(CatalogError::NoUsableFiles)?;

    let total_frames: u64 = accepted
        .iter()
        .map(|f| f.attributes.frame_count() as u64)
        .sum();
    if total_frames == 0 {
        return Err(CatalogError::NoFrames);
    }

    let optical = optical_paths(&accepted);
    let channels = reconcile_channels(optical.len(), total_frames);

    let catalog_files: Vec<CatalogFile> = accepted
        .iter()
        .map(|f| CatalogFile {
            path: Arc::from(f.path.as_path()),
            pixel_data_offset: f.attributes.pixel_data_offset,
            frame_count: f.attributes.frame_count(),
        })
        .collect();

    let (tiles, depths) = match mode {
        CatalogMode::Explicit => {
            explicit_tiles(&accepted, &catalog_files, &geometry, &optical, channels)
        }
        CatalogMode::Regular => {
            regular_tiles(&accepted, &catalog_files, &geometry, channels, total_frames)
        }
    };

    if tiles.is_empty() {
        return Err(CatalogError::NoFrames);
    }

    debug!(
        "Catalog: {} tiles, {} depth(s), {} channel(s), {:?} mode",
        tiles.len(),
        depths.len(),
        channels,
        mode
    );

    Ok(TileCatalog::new(
        catalog_files,
        tiles,
        depths,
        channels,
        mode,
        geometry,
    ))
}

fn descriptor(
    file: &CatalogFile,
    file_index: usize,
    frame_index: u32,
    region: Region,
    channel: u32,
    depth: DepthKey,
    geometry: &SeriesGeometry,
) -> TileDescriptor {
    TileDescriptor {
        region,
        source_file: Arc::clone(&file.path),
        file_index,
        frame_index,
        extent: TileExtent::Pending,
        channel,
        depth,
        codec: geometry.codec.clone(),
        is_last_in_file: frame_index + 1 == file.frame_count,
    }
}

fn explicit_tiles(
    files: &[&SeriesFile],
    catalog_files: &[CatalogFile],
    geometry: &SeriesGeometry,
    optical: &[String],
    channels: u32,
) -> (Vec<TileDescriptor>, Vec<DepthKey>) {
    let mut tiles = Vec::new();

    for (file_index, (file, entry)) in files.iter().zip(catalog_files).enumerate() {
        let frames = &file.attributes.frames;
        for (frame_index, frame) in frames.iter().take(entry.frame_count as usize).enumerate() {
            let (x, y) = match frame.position() {
                Some(position) => position,
                None => {
                    warn!(
                        "{} frame {} has no tile position; skipped",
                        file.path.display(),
                        frame_index
                    );
                    continue;
                }
            };

            let depth = frame
                .z_offset
                .map(DepthKey::Offset)
                .unwrap_or(DepthKey::Index(0));
            let channel = if channels > 1 {
                frame
                    .optical_path
                    .as_deref()
                    .and_then(|id| optical.iter().position(|known| known == id.trim()))
                    .unwrap_or(0) as u32
            } else {
                0
            };

            tiles.push(descriptor(
                entry,
                file_index,
                frame_index as u32,
                Region::new(x, y, geometry.tile_width, geometry.tile_height),
                channel,
                depth,
                geometry,
            ));
        }
    }

    let mut depths: Vec<DepthKey> = tiles.iter().map(|t| t.depth).collect();
    depths.sort();
    depths.dedup();

    (tiles, depths)
}

fn regular_tiles(
    files: &[&SeriesFile],
    catalog_files: &[CatalogFile],
    geometry: &SeriesGeometry,
    channels: u32,
    total_frames: u64,
) -> (Vec<TileDescriptor>, Vec<DepthKey>) {
    let tx = geometry.tiles_x() as u64;
    let ty = geometry.tiles_y() as u64;
    let per_plane = tx * ty;

    let declared_planes = files
        .first()
        .and_then(|f| f.attributes.total_pixel_matrix_focal_planes)
        .filter(|&z| z > 0);
    let planes = match declared_planes {
        Some(z) => z as u64,
        None => (total_frames / (per_plane * channels as u64)).max(1),
    };

    let mut tiles = Vec::with_capacity(total_frames as usize);
    let mut running = 0u64;

    for (file_index, (file, entry)) in files.iter().zip(catalog_files).enumerate() {
        let start = file
            .attributes
            .concatenation_frame_offset_number
            .map(u64::from)
            .unwrap_or(running);

        for k in 0..entry.frame_count as u64 {
            let n = start + k;
            let x = (n % tx) * geometry.tile_width as u64;
            let y = ((n / tx) % ty) * geometry.tile_height as u64;
            let z = (n / per_plane) % planes;
            let c = n / (per_plane * planes);

            tiles.push(descriptor(
                entry,
                file_index,
                k as u32,
                Region::new(x as u32, y as u32, geometry.tile_width, geometry.tile_height),
                c as u32,
                DepthKey::Index(z as u32),
                geometry,
            ));
        }

        running += entry.frame_count as u64;
    }

    let depths = (0..planes as u32).map(DepthKey::Index).collect();
    (tiles, depths)
}
