//! # DICOM Tile Reader
//!
//! Random-access reader for tiled DICOM whole-slide images.
//!
//! A series may be spread over many files. This library groups those files,
//! indexes every tile of the series, and decodes arbitrary rectangles of one
//! plane without loading whole files into memory.
//!
//! ## Features
//!
//! - **Series grouping**: Sibling files are matched on acquisition date and
//!   time, series number, specimen and instance UID lineage, or taken from a
//!   DICOMDIR
//! - **Tile catalogs**: Explicit per-frame positions or the regular
//!   `TILED_FULL` grid, with focal planes and optical path channels
//! - **Byte-range resolution**: Raw arithmetic, RLE segment walks and JPEG
//!   marker scans, done once per series
//! - **Codecs**: Uncompressed, RLE Lossless, baseline JPEG and JPEG 2000
//!
//! ## Architecture
//!
//! - [`io`] - Range readers, file sources and the forward scan cursor
//! - [`dicom`] - Attribute records, sidecar attribute source, transfer syntaxes
//! - [`series`] - Sibling file resolution and DICOMDIR handling
//! - [`catalog`] - Series geometry, tile catalog and byte-range resolution
//! - [`codec`] - Tile decoders and the decoded tile cache
//! - [`plane`] - Series handles and plane reads
//! - [`config`] - Reader options and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use dicom_tile_reader::{open_series, ReaderConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let series = open_series("/data/slide/level-0.dcm", &ReaderConfig::default())
//!         .await
//!         .expect("series opens");
//!
//!     // top-left 512x512 of the first plane
//!     let samples = series.open_plane(0, 0, 0, 512, 512).await.expect("plane reads");
//!     println!("{} bytes from {} file(s)", samples.len(), series.list_files().len());
//! }
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod dicom;
pub mod error;
pub mod io;
pub mod plane;
pub mod series;

// Re-export commonly used types
pub use catalog::{
    build_catalog, resolve_offsets, CatalogMode, DepthKey, Region, SeriesGeometry, TileCatalog,
    TileDescriptor, TileExtent,
};
pub use codec::{PixelBuffer, PixelLayout, TileDecoder};
pub use config::{Cli, Command, ReaderConfig};
pub use dicom::{AttributeScope, AttributeSet, AttributeSource, ByteOrder, Codec};
pub use error::{AttributeError, CatalogError, DecodeError, IoError, ReadError};
pub use io::{FileSource, LocalFileSource, RangeReader};
pub use plane::{open_series, DimensionIndexer, SeriesHandle, SeriesMetadata};
pub use series::{resolve_series, SeriesFileList};
