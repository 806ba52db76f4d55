//! Tile codecs.
//!
//! This module turns encoded frame bytes into samples:
//!
//! - [`packbits`] and [`rle`]: RLE Lossless segments and frame walking
//! - [`jpeg`]: baseline JPEG repair and decoding
//! - [`jpeg2000`]: JPEG 2000 decoding
//! - [`TileDecoder`]: per-tile dispatch, sub-region reads and caching

mod decoder;
pub mod jpeg;
pub mod jpeg2000;
pub mod packbits;
mod pixels;
pub mod rle;

pub use decoder::{DecodedTileCache, TileDecoder};
pub use pixels::{PixelBuffer, PixelLayout};
