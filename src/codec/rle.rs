//! Walking RLE Lossless frames.
//!
//! An encapsulated RLE frame holds one PackBits segment per byte of each
//! sample: for `S` samples of `B` bytes there are `S * B` segments, the
//! most significant byte of each sample first. Frames are optionally
//! wrapped in an encapsulation item and preceded by a 64-byte segment
//! header. Without a header the segments follow each other separated by
//! zero padding.
//!
//! The byte-range resolver walks frames to find where each one ends; the
//! tile decoder walks a single frame again and keeps the decoded bytes.

use bytes::Bytes;

use crate::error::IoError;
use crate::io::{read_u32_le, ForwardCursor, RangeReader};

use super::packbits::PackBitsDecoder;

/// Item tag (FFFE,E000) as stored little-endian.
pub const ITEM_TAG: [u8; 4] = [0xFE, 0xFF, 0x00, 0xE0];

/// Size of an RLE segment header.
pub const RLE_HEADER_LEN: usize = 64;

const MAX_SEGMENTS: usize = 15;

/// Shape of one RLE frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RleLayout {
    /// Number of segments (`samples * bytes_per_sample`).
    pub segments: usize,
    /// Decoded length of each segment (`tile_width * tile_height`).
    pub segment_len: usize,
}

/// Result of walking one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RleFrame {
    /// Offset where the frame started, after any offset table.
    pub start: u64,
    /// Offset just past the frame.
    pub end: u64,
    /// The file ended before every segment was decoded.
    pub truncated: bool,
}

/// Return the segment offsets of a valid RLE header for `segments`
/// segments, or `None` when `bytes` is not one.
pub fn parse_header(bytes: &[u8], segments: usize) -> Option<Vec<u64>> {
    if bytes.len() < RLE_HEADER_LEN || segments == 0 || segments > MAX_SEGMENTS {
        return None;
    }

    let count = read_u32_le(&bytes[0..4]) as usize;
    if count != segments {
        return None;
    }

    let offsets: Vec<u64> = (0..MAX_SEGMENTS)
        .map(|i| read_u32_le(&bytes[4 + i * 4..8 + i * 4]) as u64)
        .collect();

    if offsets[0] != RLE_HEADER_LEN as u64 || offsets[count..].iter().any(|&o| o != 0) {
        return None;
    }
    if offsets[..count].windows(2).any(|w| w[1] < w[0]) {
        return None;
    }

    Some(offsets[..count].to_vec())
}

fn is_item_tag(bytes: &Bytes) -> bool {
    bytes.len() >= 8 && bytes[0..4] == ITEM_TAG
}

/// Decode one segment, appending at most `target` bytes to `out`.
///
/// Returns `false` when the file ended first.
async fn decode_segment<R: RangeReader + ?Sized>(
    cursor: &mut ForwardCursor<'_, R>,
    target: usize,
    mut out: Option<&mut Vec<u8>>,
) -> Result<bool, IoError> {
    let mut decoder = PackBitsDecoder::new(target);
    while !decoder.is_complete() {
        let chunk = cursor.fill().await?;
        if chunk.is_empty() {
            return Ok(false);
        }
        let consumed = decoder.feed(&chunk, out.as_deref_mut());
        cursor.advance(consumed);
    }
    Ok(true)
}

/// Walk one frame starting at the cursor position.
///
/// With `skip_offset_table`, an item at the start is the basic offset table
/// and is skipped first. When `segments_out` is given it receives one
/// buffer per segment, each resized to `segment_len`. Padding after the
/// final segment is left alone when `last_in_file` is set.
pub async fn walk_frame<R: RangeReader + ?Sized>(
    cursor: &mut ForwardCursor<'_, R>,
    layout: RleLayout,
    skip_offset_table: bool,
    last_in_file: bool,
    mut segments_out: Option<&mut Vec<Vec<u8>>>,
) -> Result<RleFrame, IoError> {
    if skip_offset_table {
        let tag = cursor.peek(8).await?;
        if is_item_tag(&tag) {
            let len = read_u32_le(&tag[4..8]) as u64;
            cursor.seek(cursor.position() + 8 + len);
        }
    }

    let start = cursor.position();

    let mut item_end = None;
    let tag = cursor.peek(8).await?;
    if is_item_tag(&tag) {
        let len = read_u32_le(&tag[4..8]) as u64;
        cursor.advance(8);
        item_end = Some(cursor.position() + len);
    }

    let frame_start = cursor.position();
    let header = parse_header(&cursor.peek(RLE_HEADER_LEN).await?, layout.segments);

    if let Some(out) = segments_out.as_deref_mut() {
        out.clear();
        out.resize_with(layout.segments, || Vec::with_capacity(layout.segment_len));
    }

    let mut truncated = false;
    for segment in 0..layout.segments {
        if let Some(offsets) = &header {
            cursor.seek(frame_start + offsets[segment]);
        }

        let out = segments_out.as_deref_mut().map(|o| &mut o[segment]);
        if !decode_segment(cursor, layout.segment_len, out).await? {
            truncated = true;
            break;
        }

        let final_segment = segment + 1 == layout.segments;
        if header.is_none() && !(final_segment && last_in_file) {
            cursor.skip_zeros().await?;
        }
    }

    if let Some(out) = segments_out {
        for segment in out.iter_mut() {
            segment.resize(layout.segment_len, 0);
        }
    }

    let end = match item_end {
        Some(end) if !truncated => end.min(cursor.len()),
        _ => cursor.position(),
    };
    cursor.seek(end);

    Ok(RleFrame {
        start,
        end,
        truncated,
    })
}

/// Build an RLE frame with a segment header, as written by standard encoders.
///
/// `segments` are the raw (unencoded) byte planes.
pub fn encode_frame_with_header(segments: &[Vec<u8>]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = segments
        .iter()
        .map(|s| {
            let mut e = super::packbits::encode(s);
            if e.len() % 2 == 1 {
                e.push(0);
            }
            e
        })
        .collect();

    let mut header = vec![0u8; RLE_HEADER_LEN];
    header[0..4].copy_from_slice(&(segments.len() as u32).to_le_bytes());
    let mut offset = RLE_HEADER_LEN as u32;
    for (i, segment) in encoded.iter().enumerate() {
        header[4 + i * 4..8 + i * 4].copy_from_slice(&offset.to_le_bytes());
        offset += segment.len() as u32;
    }

    let mut frame = header;
    for segment in encoded {
        frame.extend_from_slice(&segment);
    }
    frame
}
