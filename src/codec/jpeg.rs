//! JPEG stream repair and decoding.
//!
//! Frames located by marker scanning often carry bytes that a strict
//! decoder rejects: a missing fill byte after SOI, a reserved JPG extension
//! marker where the frame header should be, a missing EOI, or the next
//! frame's item tag after EOI. [`repair`] fixes these before the stream is
//! handed to the `image` crate.
//!
//! # Colour
//!
//! Streams declared as YCbCr but carrying an Adobe segment with transform
//! flag 0 are not colour converted by the decoder. Those samples are
//! converted here with [`ycbcr_to_rgb`].

use std::io::Cursor;

use image::{ColorType, ImageFormat, ImageReader};

use crate::catalog::Region;
use crate::error::DecodeError;

use super::pixels::{PixelBuffer, PixelLayout};

// =============================================================================
// JPEG Markers
// =============================================================================

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End Of Image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Start Of Scan marker
pub const SOS: [u8; 2] = [0xFF, 0xDA];

/// Application segment 14 (Adobe) marker
pub const APP14: [u8; 2] = [0xFF, 0xEE];

/// Start pattern of a JPEG frame (SOI followed by any marker).
pub const JPEG_START: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Start pattern of a JPEG 2000 codestream (SOC then SIZ).
pub const J2K_START: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

// =============================================================================
// Stream Repair
// =============================================================================

/// Tag of an encapsulated pixel data item.
const ITEM_TAG: [u8; 4] = [0xFE, 0xFF, 0x00, 0xE0];

/// Tag closing an encapsulated pixel data sequence.
const SEQUENCE_DELIMITER: [u8; 4] = [0xFE, 0xFF, 0xDD, 0xE0];

/// End offset of the last EOI marker in `data`.
///
/// A located frame may run into the header of the next item, whose length
/// bytes can contain `FFD9`. When an item tag follows an EOI, only the
/// bytes before the last such tag are searched.
pub(crate) fn eoi_end(data: &[u8]) -> Option<usize> {
    let last_eoi = |bytes: &[u8]| bytes.windows(2).rposition(|w| w == EOI).map(|pos| pos + 2);

    let tag = data
        .windows(4)
        .rposition(|w| w == ITEM_TAG || w == SEQUENCE_DELIMITER);
    if let Some(end) = tag.and_then(|pos| last_eoi(&data[..pos])) {
        return Some(end);
    }
    last_eoi(data)
}

/// Truncate `data` just after its last EOI marker, or append one if there
/// is none.
pub fn truncate_at_eoi(mut data: Vec<u8>) -> Vec<u8> {
    match eoi_end(&data) {
        Some(end) => data.truncate(end),
        None => data.extend_from_slice(&EOI),
    }
    data
}

/// Repair a JPEG frame for decoding.
///
/// 1. Insert `FF` when the third byte is not a marker prefix.
/// 2. Rewrite a reserved `FFF0`..`FFFD` marker after SOI to the SOF marker
///    `0x30` below it.
/// 3. Cut trailing bytes after the last EOI, or append EOI if absent.
pub fn repair(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 3);
    out.extend_from_slice(data);

    if out.len() >= 3 && out[2] != 0xFF {
        out.insert(2, 0xFF);
    }
    if out.len() >= 4 && (0xF0..=0xFD).contains(&out[3]) {
        out[3] -= 0x30;
    }

    truncate_at_eoi(out)
}

// =============================================================================
// Stream Analysis
// =============================================================================

/// Transform flag of the Adobe APP14 segment before the first scan.
///
/// Returns `None` when the stream has no Adobe segment.
pub fn adobe_transform(data: &[u8]) -> Option<u8> {
    if data.len() < 4 || data[0..2] != SOI {
        return None;
    }

    let mut pos = 2;
    while pos + 3 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = [data[pos], data[pos + 1]];
        if marker == SOS || marker == EOI {
            return None;
        }
        // Fill bytes and standalone markers
        if marker[1] == 0xFF || marker[1] == 0x01 || (0xD0..=0xD8).contains(&marker[1]) {
            pos += if marker[1] == 0xFF { 1 } else { 2 };
            continue;
        }

        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if marker == APP14 && length >= 12 {
            let segment = &data[pos + 4..(pos + 2 + length).min(data.len())];
            if segment.len() >= 12 && segment.starts_with(b"Adobe") {
                return Some(segment[11]);
            }
        }
        pos += 2 + length;
    }

    None
}

/// Convert interleaved 8-bit YCbCr samples to RGB in place.
pub fn ycbcr_to_rgb(data: &mut [u8]) {
    for pixel in data.chunks_exact_mut(3) {
        let y = pixel[0] as f32;
        let cb = pixel[1] as f32 - 128.0;
        let cr = pixel[2] as f32 - 128.0;

        let r = y + 1.402 * cr;
        let g = y - 0.344_136 * cb - 0.714_136 * cr;
        let b = y + 1.772 * cb;

        pixel[0] = r.round().clamp(0.0, 255.0) as u8;
        pixel[1] = g.round().clamp(0.0, 255.0) as u8;
        pixel[2] = b.round().clamp(0.0, 255.0) as u8;
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a repaired JPEG frame into an interleaved buffer of exactly
/// `width x height` pixels.
///
/// Decoded images of a different size are cropped or zero-padded.
///
/// # Arguments
/// * `data` - Repaired JPEG stream
/// * `width`, `height` - Nominal tile size
/// * `convert_ycbcr` - Convert YCbCr samples the decoder left untransformed
pub fn decode(
    data: &[u8],
    width: u32,
    height: u32,
    convert_ycbcr: bool,
) -> Result<PixelBuffer, DecodeError> {
    let reader = ImageReader::with_format(Cursor::new(data), ImageFormat::Jpeg);
    let img = reader
        .decode()
        .map_err(|e| DecodeError::Jpeg(e.to_string()))?;

    let (img_width, img_height) = (img.width(), img.height());
    let (samples, mut samples_data) = match img.color() {
        ColorType::L8 | ColorType::La8 => (1, img.into_luma8().into_raw()),
        _ => (3, img.into_rgb8().into_raw()),
    };

    if convert_ycbcr && samples == 3 {
        ycbcr_to_rgb(&mut samples_data);
    }

    let decoded = PixelBuffer::from_data(
        img_width,
        img_height,
        samples,
        1,
        PixelLayout::Interleaved,
        samples_data,
    );
    Ok(fit(decoded, width, height))
}

/// Crop or zero-pad `buffer` to `width x height`.
pub(crate) fn fit(buffer: PixelBuffer, width: u32, height: u32) -> PixelBuffer {
    if buffer.width == width && buffer.height == height {
        return buffer;
    }

    let mut out = PixelBuffer::zeroed(
        width,
        height,
        buffer.samples,
        buffer.bytes_per_sample,
        buffer.layout,
    );
    let overlap = Region::new(0, 0, buffer.width.min(width), buffer.height.min(height));
    buffer.copy_to(overlap, &mut out.data, out.layout, width, height, 0, 0);
    out
}

// =============================================================================
// Tests
// =============================================================================
