//! Opened series and plane reads.
//!
//! A [`SeriesHandle`] is built once per series:
//!
//! 1. Read the opened file's attributes
//! 2. Resolve the series file list
//! 3. Build the tile catalog from every file's attributes
//! 4. Resolve the byte range of every tile
//!
//! After that the catalog is immutable. Each read opens its own readers for
//! the files it touches and drops them when it returns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{
    build_catalog, resolve_offsets, CatalogMode, Region, SeriesFile, TileCatalog, TileExtent,
};
use crate::codec::{PixelLayout, TileDecoder};
use crate::config::ReaderConfig;
use crate::dicom::{AttributeScope, AttributeSource, ByteOrder, Codec, SidecarAttributeSource};
use crate::error::{CatalogError, DecodeError, ReadError};
use crate::io::{FileSource, LocalFileSource};
use crate::series::{resolve_series, SeriesFileList};

use super::dimensions::DimensionIndexer;
use super::photometric::{inversion_max, invert_samples};

// =============================================================================
// Series Metadata
// =============================================================================

/// Summary of an opened series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesMetadata {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub samples_per_pixel: u16,
    pub bytes_per_sample: usize,
    pub signed: bool,
    pub byte_order: ByteOrder,
    pub codec: Codec,
    pub photometric: String,
    /// Layout of samples returned by plane reads.
    pub layout: PixelLayout,
    pub mode: CatalogMode,
    pub tiles: usize,
    pub resolved_tiles: usize,
    pub depths: usize,
    pub channels: u32,
    pub planes: usize,
    pub files: Vec<PathBuf>,
    pub companions: Vec<PathBuf>,
}

// =============================================================================
// Series Handle
// =============================================================================

/// An opened series, ready for plane reads.
pub struct SeriesHandle<F: FileSource> {
    files: F,
    path: PathBuf,
    list: SeriesFileList,
    catalog: Arc<TileCatalog>,
    decoder: TileDecoder,
    dimensions: DimensionIndexer,
    layout: PixelLayout,
}

impl<F: FileSource> SeriesHandle<F> {
    /// Open the series containing `path`.
    ///
    /// # Arguments
    /// * `files` - Source of readers and directory listings
    /// * `attributes` - Source of decoded DICOM attributes
    /// * `path` - Any file of the series, or a directory index
    /// * `config` - Reader options
    ///
    /// # Errors
    /// Fails when the configuration is invalid, the opened file has no
    /// attributes, no file yields a usable catalog, or no tile can be
    /// located.
    pub async fn open<A: AttributeSource>(
        files: F,
        attributes: &A,
        path: impl AsRef<Path>,
        config: &ReaderConfig,
    ) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        config.validate().map_err(CatalogError::InvalidConfig)?;

        let opened = attributes.read_attributes(path, AttributeScope::Full).await?;
        let list = resolve_series(&files, attributes, path, &opened, config).await?;

        let mut series_files = Vec::with_capacity(list.len());
        for file in list.files() {
            let attrs = if file == path {
                opened.clone()
            } else {
                match attributes.read_attributes(file, AttributeScope::Full).await {
                    Ok(attrs) => attrs,
                    Err(e) => {
                        warn!("Skipping {}: {}", file.display(), e);
                        continue;
                    }
                }
            };
            series_files.push(SeriesFile::new(file.clone(), attrs));
        }

        let mut catalog = build_catalog(&series_files)?;
        resolve_offsets(&files, &mut catalog).await?;

        let geometry = catalog.geometry().clone();
        let dimensions =
            DimensionIndexer::new(catalog.depth_count(), catalog.channel_count() as usize);
        let layout = config.layout.unwrap_or_else(|| geometry.native_layout());

        info!(
            "Opened {}: {}x{} canvas, {}x{} tiles, {} codec, {} of {} tiles located in {} file(s), {} plane(s)",
            path.display(),
            geometry.width,
            geometry.height,
            geometry.tile_width,
            geometry.tile_height,
            geometry.codec,
            catalog.resolved_count(),
            catalog.len(),
            catalog.files().len(),
            dimensions.plane_count()
        );

        Ok(Self {
            files,
            path: path.to_path_buf(),
            list,
            catalog: Arc::new(catalog),
            decoder: TileDecoder::new(geometry, config.decoded_tile_cache),
            dimensions,
            layout,
        })
    }

    pub fn catalog(&self) -> &Arc<TileCatalog> {
        &self.catalog
    }

    pub fn dimensions(&self) -> DimensionIndexer {
        self.dimensions
    }

    pub fn plane_count(&self) -> usize {
        self.dimensions.plane_count()
    }

    /// Layout of samples returned by plane reads.
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Bytes needed for a `width x height` read.
    pub fn plane_bytes(&self, width: u32, height: u32) -> usize {
        self.catalog.geometry().plane_bytes(width, height)
    }

    /// Pixel data files in series order.
    pub fn list_files(&self) -> &[PathBuf] {
        self.list.files()
    }

    /// Files of the series that hold no pixel data.
    pub fn companion_files(&self) -> &[PathBuf] {
        self.list.companions()
    }

    /// Pixel data files followed by companion files, without duplicates.
    pub fn used_files(&self) -> Vec<PathBuf> {
        let mut used: Vec<PathBuf> = Vec::new();
        for file in self.list.files().iter().chain(self.list.companions()) {
            if !used.contains(file) {
                used.push(file.clone());
            }
        }
        used
    }

    /// Drop every cached decoded tile.
    pub async fn clear_cache(&self) {
        self.decoder.cache().clear().await;
    }

    pub fn metadata(&self) -> SeriesMetadata {
        let g = self.catalog.geometry();
        SeriesMetadata {
            path: self.path.clone(),
            width: g.width,
            height: g.height,
            tile_width: g.tile_width,
            tile_height: g.tile_height,
            samples_per_pixel: g.samples_per_pixel,
            bytes_per_sample: g.bytes_per_sample,
            signed: g.signed,
            byte_order: g.byte_order,
            codec: g.codec.clone(),
            photometric: g.photometric.clone(),
            layout: self.layout,
            mode: self.catalog.mode(),
            tiles: self.catalog.len(),
            resolved_tiles: self.catalog.resolved_count(),
            depths: self.catalog.depth_count(),
            channels: self.catalog.channel_count(),
            planes: self.plane_count(),
            files: self.list.files().to_vec(),
            companions: self.list.companions().to_vec(),
        }
    }

    /// Read a rectangle of one plane into a new buffer.
    ///
    /// Areas not covered by any decodable tile are zero.
    pub async fn open_plane(
        &self,
        plane: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, ReadError> {
        let mut buf = vec![0u8; self.plane_bytes(width, height)];
        self.open_plane_into(plane, &mut buf, x, y, width, height)
            .await?;
        Ok(buf)
    }

    /// Read a rectangle of one plane into `buf`.
    ///
    /// Tiles are written in catalog order, so a later tile overwrites an
    /// earlier one where they overlap. Bytes of `buf` not covered by a
    /// decoded tile are left unchanged.
    ///
    /// # Errors
    /// * `PlaneOutOfRange` if `plane` is not below the plane count
    /// * `RegionOutOfBounds` if the rectangle is empty or leaves the canvas
    /// * `BufferTooSmall` if `buf` cannot hold the rectangle
    /// * `Decode` if a tile in the rectangle uses an unsupported codec
    pub async fn open_plane_into(
        &self,
        plane: usize,
        buf: &mut [u8],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), ReadError> {
        let g = self.catalog.geometry();

        let (z, c, _t) = self
            .dimensions
            .coordinates(plane)
            .ok_or(ReadError::PlaneOutOfRange {
                plane,
                count: self.plane_count(),
            })?;

        let request = Region::new(x, y, width, height);
        if request.is_empty() || request.right() > g.width as u64 || request.bottom() > g.height as u64
        {
            return Err(ReadError::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                canvas_width: g.width,
                canvas_height: g.height,
            });
        }

        let required = self.plane_bytes(width, height);
        if buf.len() < required {
            return Err(ReadError::BufferTooSmall {
                required,
                actual: buf.len(),
            });
        }

        let indices = self.catalog.tiles_for_plane(z, c as u32, &request);
        if indices.is_empty() {
            warn!(
                "No tiles of plane {} intersect {:?} in {}",
                plane,
                request,
                self.path.display()
            );
            return Ok(());
        }

        let invert = g.is_inverted();
        let max = inversion_max(g);
        let mut readers: HashMap<usize, F::Reader> = HashMap::new();

        for index in indices {
            let tile = &self.catalog.tiles()[index];
            let Some(overlap) = tile.region.intersection(&request) else {
                continue;
            };

            match &tile.extent {
                TileExtent::Unsupported => {
                    return Err(DecodeError::UnsupportedCompression(tile.codec.to_string()).into())
                }
                TileExtent::Unlocated { reason } => {
                    warn!(
                        "Skipping tile {:?} of {} ({}): {}",
                        tile.region,
                        tile.source_file.display(),
                        tile.codec,
                        reason
                    );
                    continue;
                }
                _ => {}
            }

            if !readers.contains_key(&tile.file_index) {
                match self.files.create_reader(&tile.source_file).await {
                    Ok(reader) => {
                        readers.insert(tile.file_index, reader);
                    }
                    Err(e) => {
                        warn!(
                            "Skipping tile {:?}: cannot open {}: {}",
                            tile.region,
                            tile.source_file.display(),
                            e
                        );
                        continue;
                    }
                }
            }
            let Some(reader) = readers.get(&tile.file_index) else {
                continue;
            };

            match self
                .decoder
                .decode(reader, index, tile, overlap, self.layout)
                .await
            {
                Ok(mut pixels) => {
                    if invert {
                        invert_samples(&mut pixels.data, g.bytes_per_sample, g.byte_order, max);
                    }
                    pixels.copy_to(
                        Region::new(0, 0, overlap.width, overlap.height),
                        buf,
                        self.layout,
                        width,
                        height,
                        overlap.x - x,
                        overlap.y - y,
                    );
                }
                Err(DecodeError::UnsupportedCompression(codec)) => {
                    return Err(DecodeError::UnsupportedCompression(codec).into());
                }
                Err(e) => {
                    warn!(
                        "Skipping tile {:?} of {} ({}): {}",
                        tile.region,
                        tile.source_file.display(),
                        tile.codec,
                        e
                    );
                }
            }
        }

        debug!("Read plane {} {:?} from {} file(s)", plane, request, readers.len());
        Ok(())
    }
}

// =============================================================================
// Local Files
// =============================================================================

/// Open a series from the local filesystem, with attributes read from
/// `<file>.json` sidecars.
pub async fn open_series(
    path: impl AsRef<Path>,
    config: &ReaderConfig,
) -> Result<SeriesHandle<LocalFileSource>, CatalogError> {
    let attributes = SidecarAttributeSource::new(LocalFileSource::new());
    SeriesHandle::open(LocalFileSource::new(), &attributes, path, config).await
}
