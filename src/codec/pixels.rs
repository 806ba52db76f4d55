//! Decoded sample buffers and layout conversion.

use serde::Serialize;

use crate::catalog::Region;

/// Arrangement of samples in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    /// All samples of a pixel are adjacent (`RGBRGB...`).
    Interleaved,
    /// One full plane per sample (`RR...GG...BB...`).
    Planar,
}

/// Rectangle of decoded samples.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub samples: usize,
    pub bytes_per_sample: usize,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Zero-filled buffer.
    pub fn zeroed(
        width: u32,
        height: u32,
        samples: usize,
        bytes_per_sample: usize,
        layout: PixelLayout,
    ) -> Self {
        let len = width as usize * height as usize * samples * bytes_per_sample;
        Self {
            width,
            height,
            samples,
            bytes_per_sample,
            layout,
            data: vec![0; len],
        }
    }

    /// Wrap decoded samples. Short data is zero-padded and long data is
    /// truncated to the exact buffer size.
    pub fn from_data(
        width: u32,
        height: u32,
        samples: usize,
        bytes_per_sample: usize,
        layout: PixelLayout,
        mut data: Vec<u8>,
    ) -> Self {
        data.resize(width as usize * height as usize * samples * bytes_per_sample, 0);
        Self {
            width,
            height,
            samples,
            bytes_per_sample,
            layout,
            data,
        }
    }

    /// Byte size of a buffer with the given shape.
    pub fn byte_len(width: u32, height: u32, samples: usize, bytes_per_sample: usize) -> usize {
        width as usize * height as usize * samples * bytes_per_sample
    }

    /// Byte offset of sample `s` of pixel (x, y).
    #[inline]
    #[allow(clippy::too_many_arguments)]
    fn offset_of(
        layout: PixelLayout,
        width: usize,
        height: usize,
        samples: usize,
        bps: usize,
        x: usize,
        y: usize,
        s: usize,
    ) -> usize {
        match layout {
            PixelLayout::Interleaved => ((y * width + x) * samples + s) * bps,
            PixelLayout::Planar => ((s * height + y) * width + x) * bps,
        }
    }

    /// Copy `src` (in this buffer's pixel coordinates) into `dest`, a buffer
    /// of `dest_width x dest_height` pixels in `dest_layout`, with the
    /// top-left corner at (`dest_x`, `dest_y`).
    ///
    /// The caller guarantees that both rectangles fit their buffers.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_to(
        &self,
        src: Region,
        dest: &mut [u8],
        dest_layout: PixelLayout,
        dest_width: u32,
        dest_height: u32,
        dest_x: u32,
        dest_y: u32,
    ) {
        let bps = self.bytes_per_sample;
        let samples = self.samples;
        let (sw, sh) = (self.width as usize, self.height as usize);
        let (dw, dh) = (dest_width as usize, dest_height as usize);
        let (w, h) = (src.width as usize, src.height as usize);

        for row in 0..h {
            let sy = src.y as usize + row;
            let dy = dest_y as usize + row;

            if self.layout == dest_layout {
                let planes = match self.layout {
                    PixelLayout::Interleaved => 1,
                    PixelLayout::Planar => samples,
                };
                let span = match self.layout {
                    PixelLayout::Interleaved => w * samples * bps,
                    PixelLayout::Planar => w * bps,
                };
                for s in 0..planes {
                    let from =
                        Self::offset_of(self.layout, sw, sh, samples, bps, src.x as usize, sy, s);
                    let to =
                        Self::offset_of(dest_layout, dw, dh, samples, bps, dest_x as usize, dy, s);
                    dest[to..to + span].copy_from_slice(&self.data[from..from + span]);
                }
                continue;
            }

            for col in 0..w {
                for s in 0..samples {
                    let from = Self::offset_of(
                        self.layout,
                        sw,
                        sh,
                        samples,
                        bps,
                        src.x as usize + col,
                        sy,
                        s,
                    );
                    let to = Self::offset_of(
                        dest_layout,
                        dw,
                        dh,
                        samples,
                        bps,
                        dest_x as usize + col,
                        dy,
                        s,
                    );
                    dest[to..to + bps].copy_from_slice(&self.data[from..from + bps]);
                }
            }
        }
    }

    /// Extract `src` as a new buffer in `layout`.
    pub fn crop(&self, src: Region, layout: PixelLayout) -> PixelBuffer {
        let mut out = PixelBuffer::zeroed(
            src.width,
            src.height,
            self.samples,
            self.bytes_per_sample,
            layout,
        );
        self.copy_to(src, &mut out.data, layout, src.width, src.height, 0, 0);
        out
    }
}
