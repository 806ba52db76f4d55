//! MONOCHROME1 inversion.
//!
//! MONOCHROME1 stores the minimum sample value as white. Samples are
//! inverted so that callers always receive MONOCHROME2 semantics. 8-bit
//! samples become `255 - v`. Wider samples become `max - v`, where `max`
//! comes from the VOI window when it is usable and from the pixel type
//! otherwise.

use crate::catalog::SeriesGeometry;
use crate::dicom::ByteOrder;

/// Largest value of a sample of `bytes_per_sample` bytes.
pub fn natural_max(bytes_per_sample: usize, signed: bool) -> i64 {
    let bits = (bytes_per_sample.clamp(1, 4) * 8) as u32;
    if signed {
        (1i64 << (bits - 1)) - 1
    } else {
        (1i64 << bits) - 1
    }
}

/// Inversion maximum for `geometry`.
///
/// The window gives `width + center / 2`, truncated. It is ignored when
/// absent or when the center is below half the width.
pub fn inversion_max(geometry: &SeriesGeometry) -> i64 {
    if geometry.bytes_per_sample == 1 {
        return 255;
    }

    let natural = natural_max(geometry.bytes_per_sample, geometry.signed);
    match (geometry.window_center, geometry.window_width) {
        (Some(center), Some(width)) if center >= width / 2.0 => (width + center / 2.0) as i64,
        _ => natural,
    }
}

/// Invert every sample of `data` in place.
pub fn invert_samples(data: &mut [u8], bytes_per_sample: usize, byte_order: ByteOrder, max: i64) {
    match bytes_per_sample {
        1 => {
            for v in data.iter_mut() {
                *v = 255 - *v;
            }
        }
        2 => {
            for sample in data.chunks_exact_mut(2) {
                let bytes = [sample[0], sample[1]];
                let value = match byte_order {
                    ByteOrder::Little => u16::from_le_bytes(bytes),
                    ByteOrder::Big => u16::from_be_bytes(bytes),
                } as i64;
                let inverted = max.wrapping_sub(value) as u16;
                let out = match byte_order {
                    ByteOrder::Little => inverted.to_le_bytes(),
                    ByteOrder::Big => inverted.to_be_bytes(),
                };
                sample.copy_from_slice(&out);
            }
        }
        4 => {
            for sample in data.chunks_exact_mut(4) {
                let bytes = [sample[0], sample[1], sample[2], sample[3]];
                let value = match byte_order {
                    ByteOrder::Little => u32::from_le_bytes(bytes),
                    ByteOrder::Big => u32::from_be_bytes(bytes),
                } as i64;
                let inverted = max.wrapping_sub(value) as u32;
                let out = match byte_order {
                    ByteOrder::Little => inverted.to_le_bytes(),
                    ByteOrder::Big => inverted.to_be_bytes(),
                };
                sample.copy_from_slice(&out);
            }
        }
        _ => {}
    }
}
