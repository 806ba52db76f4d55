//! Byte-range resolution.
//!
//! A single pass per file, in ascending frame order, fills in the extent of
//! every tile. Depending on the codec the pass is:
//!
//! - **Raw**: arithmetic from the pixel data offset, no I/O
//! - **RLE**: a walk over the PackBits segments of each frame
//! - **JPEG / JPEG 2000**: a forward marker scan for frame start patterns
//!
//! Tiles of codecs without a decoder are marked unsupported. Tiles whose
//! frame could not be found are marked unlocated and are skipped on reads.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::codec::jpeg::{EOI, J2K_START, JPEG_START};
use crate::codec::rle::{self, RleLayout};
use crate::dicom::Codec;
use crate::error::{CatalogError, IoError};
use crate::io::{FileSource, ForwardCursor, RangeReader};

use super::geometry::SeriesGeometry;
use super::tile::{TileCatalog, TileExtent};

/// Resolve the byte range of every tile in `catalog`.
///
/// # Errors
/// Returns `CatalogError::NoTilesLocated` when no tile was resolved and no
/// tile uses an unsupported codec.
pub async fn resolve_offsets<F: FileSource>(
    files: &F,
    catalog: &mut TileCatalog,
) -> Result<(), CatalogError> {
    let geometry = catalog.geometry().clone();
    let entries = catalog.files().to_vec();

    // file index -> frame index -> tile indices
    let mut by_file: Vec<BTreeMap<u32, Vec<usize>>> = vec![BTreeMap::new(); entries.len()];
    for (index, tile) in catalog.tiles().iter().enumerate() {
        if let Some(frames) = by_file.get_mut(tile.file_index) {
            frames.entry(tile.frame_index).or_default().push(index);
        }
    }

    for (file_index, entry) in entries.iter().enumerate() {
        let count = entry.frame_count as usize;

        let extents = if !geometry.codec.is_supported() {
            vec![TileExtent::Unsupported; count]
        } else if let Some(base) = entry.pixel_data_offset {
            match &geometry.codec {
                Codec::Raw => raw_extents(base, count, geometry.frame_bytes()),
                _ => match files.create_reader(&entry.path).await {
                    Ok(reader) => scan_file(&reader, &geometry, base, count).await,
                    Err(e) => {
                        warn!("Cannot open {}: {}", entry.path.display(), e);
                        vec![unlocated(e.to_string()); count]
                    }
                },
            }
        } else {
            warn!("{} has no pixel data offset", entry.path.display());
            vec![unlocated("no pixel data offset"); count]
        };

        let resolved = extents.iter().filter(|e| e.is_resolved()).count();
        debug!(
            "Resolved {}/{} frame(s) of {} ({})",
            resolved,
            count,
            entry.path.display(),
            geometry.codec
        );

        let tiles = catalog.tiles_mut();
        for (frame, indices) in &by_file[file_index] {
            let extent = extents
                .get(*frame as usize)
                .cloned()
                .unwrap_or_else(|| unlocated("frame beyond declared count"));
            for &index in indices {
                tiles[index].extent = extent.clone();
            }
        }
    }

    let any_unsupported = catalog
        .tiles()
        .iter()
        .any(|t| t.extent == TileExtent::Unsupported);
    if catalog.resolved_count() == 0 && !any_unsupported {
        return Err(CatalogError::NoTilesLocated {
            files: entries.len(),
        });
    }

    Ok(())
}

fn unlocated(reason: impl Into<String>) -> TileExtent {
    TileExtent::Unlocated {
        reason: reason.into(),
    }
}

fn raw_extents(base: u64, count: usize, frame_bytes: u64) -> Vec<TileExtent> {
    (0..count as u64)
        .map(|i| {
            let offset = base + i * frame_bytes;
            TileExtent::Resolved {
                offset,
                end: offset + frame_bytes,
            }
        })
        .collect()
}

async fn scan_file<R: RangeReader + ?Sized>(
    reader: &R,
    geometry: &SeriesGeometry,
    base: u64,
    count: usize,
) -> Vec<TileExtent> {
    let result = match geometry.codec {
        Codec::Rle => rle_extents(reader, geometry, base, count).await,
        Codec::Jpeg => marker_extents(reader, &JPEG_START, base, count).await,
        Codec::Jpeg2000 => marker_extents(reader, &J2K_START, base, count).await,
        _ => Ok(vec![TileExtent::Unsupported; count]),
    };

    result.unwrap_or_else(|e| {
        warn!("Offset scan of {} failed: {}", reader.identifier(), e);
        vec![unlocated(e.to_string()); count]
    })
}

/// Fill `extents` up to `count` with unlocated entries.
fn finish_unlocated(extents: &mut Vec<TileExtent>, count: usize, reason: &str) {
    while extents.len() < count {
        extents.push(unlocated(reason));
    }
}

// =============================================================================
// RLE
// =============================================================================

async fn rle_extents<R: RangeReader + ?Sized>(
    reader: &R,
    geometry: &SeriesGeometry,
    base: u64,
    count: usize,
) -> Result<Vec<TileExtent>, IoError> {
    let layout = RleLayout {
        segments: geometry.samples_per_pixel as usize * geometry.bytes_per_sample,
        segment_len: geometry.tile_width as usize * geometry.tile_height as usize,
    };

    let mut cursor = ForwardCursor::new(reader, base);
    let mut extents = Vec::with_capacity(count);

    for frame in 0..count {
        let walked =
            rle::walk_frame(&mut cursor, layout, frame == 0, frame + 1 == count, None).await;
        match walked {
            Ok(walked) if !walked.truncated => extents.push(TileExtent::Resolved {
                offset: walked.start,
                end: walked.end,
            }),
            Ok(_) => {
                warn!(
                    "RLE frame {} of {} runs past end of file; {} frame(s) unlocated",
                    frame,
                    reader.identifier(),
                    count - frame
                );
                break;
            }
            Err(e) => {
                warn!("RLE walk of {} failed at frame {}: {}", reader.identifier(), frame, e);
                break;
            }
        }
    }

    finish_unlocated(&mut extents, count, "frame runs past end of file");
    Ok(extents)
}

// =============================================================================
// Marker Scan
// =============================================================================

async fn marker_extents<R: RangeReader + ?Sized>(
    reader: &R,
    pattern: &[u8],
    base: u64,
    count: usize,
) -> Result<Vec<TileExtent>, IoError> {
    let mut cursor = ForwardCursor::new(reader, base);
    let mut starts: Vec<u64> = Vec::with_capacity(count);

    for frame in 0..count {
        let from = match starts.last() {
            Some(prev) => prev + pattern.len() as u64,
            None => base,
        };
        match find_frame_start(&mut cursor, from, pattern, frame > 0).await? {
            Some(start) => starts.push(start),
            None => {
                warn!(
                    "No start of frame {} found in {}; {} frame(s) unlocated",
                    frame,
                    reader.identifier(),
                    count - frame
                );
                break;
            }
        }
    }

    let file_len = reader.size();
    let mut extents: Vec<TileExtent> = starts
        .iter()
        .enumerate()
        .map(|(i, &offset)| TileExtent::Resolved {
            offset,
            end: starts.get(i + 1).copied().unwrap_or(file_len),
        })
        .collect();

    finish_unlocated(&mut extents, count, "frame start not found");
    Ok(extents)
}

/// Find the first occurrence of `pattern` at or after `from`.
///
/// With `after_eoi` the occurrence must follow an end-of-image marker seen
/// since `from`. Chunks overlap by `pattern.len() - 1` bytes so matches
/// across chunk boundaries are found.
pub(crate) async fn find_frame_start<R: RangeReader + ?Sized>(
    cursor: &mut ForwardCursor<'_, R>,
    from: u64,
    pattern: &[u8],
    after_eoi: bool,
) -> Result<Option<u64>, IoError> {
    let keep = pattern.len().max(EOI.len()) - 1;
    let mut tail: Vec<u8> = Vec::new();
    let mut eoi_end: Option<u64> = None;

    cursor.seek(from);
    loop {
        let chunk = cursor.fill().await?;
        if chunk.is_empty() {
            return Ok(None);
        }

        let window_start = cursor.position() - tail.len() as u64;
        let mut window = std::mem::take(&mut tail);
        window.extend_from_slice(&chunk);
        cursor.advance(chunk.len());

        for j in 0..window.len() {
            let at = window_start + j as u64;

            if after_eoi && eoi_end.is_none() && window[j..].starts_with(&EOI) {
                eoi_end = Some(at + EOI.len() as u64);
            }

            if j + pattern.len() <= window.len() && window[j..].starts_with(pattern) {
                let eligible = match eoi_end {
                    Some(end) => at >= end,
                    None => !after_eoi,
                };
                if eligible {
                    return Ok(Some(at));
                }
            }
        }

        let cut = window.len().saturating_sub(keep);
        tail = window.split_off(cut);
    }
}

// =============================================================================
// Tests
// =============================================================================
