//! Tile catalog for a DICOM series.
//!
//! This module provides:
//! - [`SeriesGeometry`]: canvas, tile size and sample format of a series
//! - [`build_catalog`]: one [`TileDescriptor`] per tile, explicit or regular grid
//! - [`resolve_offsets`]: the byte range of every tile inside its file

mod builder;
pub(crate) mod geometry;
mod offsets;
mod tile;

pub use builder::{build_catalog, reconcile_channels, SeriesFile};
pub use geometry::{SeriesGeometry, MONOCHROME1};
pub use offsets::resolve_offsets;
pub use tile::{
    CatalogFile, CatalogMode, DepthKey, Region, TileCatalog, TileDescriptor, TileExtent,
};
