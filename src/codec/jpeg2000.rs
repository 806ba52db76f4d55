//! JPEG 2000 tile decoding.
//!
//! Components are written plane after plane. Samples keep the bit depth of
//! the series rather than being narrowed to 8 bits.

use jpeg2k::Image;

use crate::dicom::ByteOrder;
use crate::error::DecodeError;

use super::jpeg::eoi_end;
use super::pixels::{PixelBuffer, PixelLayout};

/// Decode a JPEG 2000 codestream into a planar buffer of `width x height`
/// pixels and `samples` components.
///
/// Bytes after the end-of-codestream marker are ignored. Missing components
/// stay zero, extra ones are dropped.
pub fn decode(
    data: &[u8],
    width: u32,
    height: u32,
    samples: usize,
    bytes_per_sample: usize,
    byte_order: ByteOrder,
) -> Result<PixelBuffer, DecodeError> {
    let data = match eoi_end(data) {
        Some(end) => &data[..end],
        None => data,
    };

    let image = Image::from_bytes(data).map_err(|e| DecodeError::Jpeg2000(e.to_string()))?;

    let mut out = PixelBuffer::zeroed(width, height, samples, bytes_per_sample, PixelLayout::Planar);
    let plane_len = width as usize * height as usize * bytes_per_sample;

    for (c, component) in image.components().iter().take(samples).enumerate() {
        let comp_width = component.width() as usize;
        let rows = (component.height() as usize).min(height as usize);
        let cols = comp_width.min(width as usize);
        let values = component.data();

        for y in 0..rows {
            for x in 0..cols {
                let Some(&value) = values.get(y * comp_width + x) else {
                    continue;
                };
                let at = c * plane_len + (y * width as usize + x) * bytes_per_sample;
                write_sample(&mut out.data[at..at + bytes_per_sample], value, byte_order);
            }
        }
    }

    Ok(out)
}

fn write_sample(dest: &mut [u8], value: i32, byte_order: ByteOrder) {
    match (dest.len(), byte_order) {
        (1, _) => dest[0] = value as u8,
        (2, ByteOrder::Little) => dest.copy_from_slice(&(value as u16).to_le_bytes()),
        (2, ByteOrder::Big) => dest.copy_from_slice(&(value as u16).to_be_bytes()),
        (_, ByteOrder::Little) => {
            let n = dest.len().min(4);
            dest[..n].copy_from_slice(&value.to_le_bytes()[..n]);
        }
        (_, ByteOrder::Big) => {
            let n = dest.len().min(4);
            let bytes = value.to_be_bytes();
            dest[..n].copy_from_slice(&bytes[4 - n..]);
        }
    }
}
