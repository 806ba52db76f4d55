//! Tile decoding.
//!
//! [`TileDecoder`] turns the located byte range of one tile into samples
//! for a sub-rectangle of that tile. Uncompressed tiles read only the rows
//! they need. Compressed tiles are decoded whole, kept in a small LRU cache
//! keyed by catalog index, and cropped.
//!
//! # Sample layout
//!
//! Output is produced in the caller's [`PixelLayout`]. Decoders work in
//! their native layout and the crop performs any conversion.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::catalog::{Region, SeriesGeometry, TileDescriptor, TileExtent};
use crate::dicom::{ByteOrder, Codec};
use crate::error::DecodeError;
use crate::io::{ForwardCursor, RangeReader};

use super::pixels::{PixelBuffer, PixelLayout};
use super::rle::{self, RleLayout};
use super::{jpeg, jpeg2000};

// =============================================================================
// Decoded Tile Cache
// =============================================================================

/// LRU cache of fully decoded tiles, keyed by catalog index.
///
/// The cache is thread-safe and can be shared across async tasks.
pub struct DecodedTileCache {
    cache: Mutex<LruCache<usize, Arc<PixelBuffer>>>,
}

impl DecodedTileCache {
    /// Cache holding up to `capacity` tiles. A capacity of zero holds one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(&self, index: usize) -> Option<Arc<PixelBuffer>> {
        self.cache.lock().await.get(&index).cloned()
    }

    pub async fn put(&self, index: usize, tile: Arc<PixelBuffer>) {
        self.cache.lock().await.put(index, tile);
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }
}

// =============================================================================
// Tile Decoder
// =============================================================================

/// Decoder for the tiles of one series.
pub struct TileDecoder {
    geometry: SeriesGeometry,
    cache: DecodedTileCache,
}

impl TileDecoder {
    /// Create a decoder caching up to `cache_capacity` decoded tiles.
    pub fn new(geometry: SeriesGeometry, cache_capacity: usize) -> Self {
        Self {
            geometry,
            cache: DecodedTileCache::new(cache_capacity),
        }
    }

    pub fn geometry(&self) -> &SeriesGeometry {
        &self.geometry
    }

    pub fn cache(&self) -> &DecodedTileCache {
        &self.cache
    }

    /// Decode the part of `tile` covered by `sub`.
    ///
    /// # Arguments
    /// * `reader` - Reader over the tile's source file
    /// * `index` - Catalog index of the tile, used as cache key
    /// * `tile` - Tile descriptor with a resolved extent
    /// * `sub` - Canvas rectangle inside the tile's nominal region
    /// * `layout` - Layout of the returned samples
    ///
    /// # Errors
    /// * `UnsupportedCompression` for codecs without a decoder
    /// * `Unlocated` when the tile's byte range is unknown
    /// * `Io`, `Malformed`, `Jpeg`, `Jpeg2000` when reading or decoding fails
    pub async fn decode<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        index: usize,
        tile: &TileDescriptor,
        sub: Region,
        layout: PixelLayout,
    ) -> Result<PixelBuffer, DecodeError> {
        let (offset, end) = match &tile.extent {
            TileExtent::Resolved { offset, end } => (*offset, *end),
            TileExtent::Unsupported => {
                return Err(DecodeError::UnsupportedCompression(tile.codec.to_string()))
            }
            TileExtent::Unlocated { reason } => return Err(DecodeError::Unlocated(reason.clone())),
            TileExtent::Pending => {
                return Err(DecodeError::Unlocated("byte range not resolved".to_string()))
            }
        };

        if !tile.region.contains(&sub) {
            return Err(DecodeError::malformed(format!(
                "sub-region {:?} outside tile {:?}",
                sub, tile.region
            )));
        }
        let local = Region::new(
            sub.x - tile.region.x,
            sub.y - tile.region.y,
            sub.width,
            sub.height,
        );

        match &tile.codec {
            Codec::Raw => self.decode_raw(reader, offset, local, layout).await,
            Codec::Rle | Codec::Jpeg | Codec::Jpeg2000 => {
                let full = self.full_tile(reader, index, tile, offset, end).await?;
                Ok(full.crop(local, layout))
            }
            Codec::Deflate | Codec::Unrecognized(_) => {
                Err(DecodeError::UnsupportedCompression(tile.codec.to_string()))
            }
        }
    }

    /// Read the rows of an uncompressed tile covering `local` and crop.
    async fn decode_raw<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        offset: u64,
        local: Region,
        layout: PixelLayout,
    ) -> Result<PixelBuffer, DecodeError> {
        let g = &self.geometry;
        let samples = g.samples_per_pixel as usize;
        let bps = g.bytes_per_sample;
        let tile_width = g.tile_width as u64;
        let native = g.native_layout();

        let data = match native {
            PixelLayout::Interleaved => {
                let stride = tile_width * samples as u64 * bps as u64;
                let start = offset + local.y as u64 * stride;
                let len = (local.height as u64 * stride) as usize;
                reader.read_exact_at(start, len).await?.to_vec()
            }
            PixelLayout::Planar => {
                let stride = tile_width * bps as u64;
                let plane = stride * g.tile_height as u64;
                let len = (local.height as u64 * stride) as usize;
                let mut data = Vec::with_capacity(len * samples);
                for s in 0..samples as u64 {
                    let start = offset + s * plane + local.y as u64 * stride;
                    data.extend_from_slice(&reader.read_exact_at(start, len).await?);
                }
                data
            }
        };

        let rows = PixelBuffer::from_data(g.tile_width, local.height, samples, bps, native, data);
        Ok(rows.crop(Region::new(local.x, 0, local.width, local.height), layout))
    }

    /// Decode a compressed tile in full, consulting the cache first.
    async fn full_tile<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        index: usize,
        tile: &TileDescriptor,
        offset: u64,
        end: u64,
    ) -> Result<Arc<PixelBuffer>, DecodeError> {
        if let Some(hit) = self.cache.get(index).await {
            return Ok(hit);
        }

        let g = &self.geometry;
        let decoded = match &tile.codec {
            Codec::Rle => self.decode_rle(reader, tile, offset).await?,
            Codec::Jpeg => {
                let data = self.read_range(reader, offset, end).await?;
                let repaired = jpeg::repair(&data);
                let convert = g.is_ycbcr() && jpeg::adobe_transform(&repaired) == Some(0);
                jpeg::decode(&repaired, g.tile_width, g.tile_height, convert)?
            }
            Codec::Jpeg2000 => {
                let data = self.read_range(reader, offset, end).await?;
                jpeg2000::decode(
                    &data,
                    g.tile_width,
                    g.tile_height,
                    g.samples_per_pixel as usize,
                    g.bytes_per_sample,
                    g.byte_order,
                )?
            }
            other => return Err(DecodeError::UnsupportedCompression(other.to_string())),
        };

        if decoded.samples != g.samples_per_pixel as usize
            || decoded.bytes_per_sample != g.bytes_per_sample
        {
            return Err(DecodeError::malformed(format!(
                "decoded {} sample(s) of {} byte(s), series declares {} of {}",
                decoded.samples, decoded.bytes_per_sample, g.samples_per_pixel, g.bytes_per_sample
            )));
        }

        let decoded = Arc::new(decoded);
        self.cache.put(index, decoded.clone()).await;
        Ok(decoded)
    }

    async fn read_range<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        offset: u64,
        end: u64,
    ) -> Result<bytes::Bytes, DecodeError> {
        if end <= offset {
            return Err(DecodeError::malformed(format!(
                "empty byte range {}..{}",
                offset, end
            )));
        }
        Ok(reader.read_exact_at(offset, (end - offset) as usize).await?)
    }

    /// Decode an RLE frame into a planar buffer.
    async fn decode_rle<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        tile: &TileDescriptor,
        offset: u64,
    ) -> Result<PixelBuffer, DecodeError> {
        let g = &self.geometry;
        let samples = g.samples_per_pixel as usize;
        let bps = g.bytes_per_sample;
        let pixels = g.tile_width as usize * g.tile_height as usize;
        let layout = RleLayout {
            segments: samples * bps,
            segment_len: pixels,
        };

        let mut cursor = ForwardCursor::new(reader, offset);
        let mut segments = Vec::new();
        let frame = rle::walk_frame(
            &mut cursor,
            layout,
            false,
            tile.is_last_in_file,
            Some(&mut segments),
        )
        .await?;

        if frame.truncated {
            warn!(
                "RLE frame {} of {} is truncated, padding with zeros",
                tile.frame_index,
                tile.source_file.display()
            );
        }
        debug!(
            "Decoded RLE frame {} ({} bytes)",
            tile.frame_index,
            frame.end - frame.start
        );

        // segment s * bps + k holds byte k of each sample, most significant first
        let mut data = vec![0u8; samples * pixels * bps];
        for s in 0..samples {
            for k in 0..bps {
                let position = match g.byte_order {
                    ByteOrder::Big => k,
                    ByteOrder::Little => bps - 1 - k,
                };
                let segment = &segments[s * bps + k];
                for (p, &byte) in segment.iter().enumerate() {
                    data[(s * pixels + p) * bps + position] = byte;
                }
            }
        }

        Ok(PixelBuffer::from_data(
            g.tile_width,
            g.tile_height,
            samples,
            bps,
            PixelLayout::Planar,
            data,
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
