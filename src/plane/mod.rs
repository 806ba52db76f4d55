//! Plane assembly.
//!
//! Maps plane indices to depth and channel, selects the tiles that cover a
//! requested rectangle, and composites their decoded samples.

mod dimensions;
mod handle;
mod photometric;

pub use dimensions::DimensionIndexer;
pub use handle::{open_series, SeriesHandle, SeriesMetadata};
pub use photometric::{inversion_max, invert_samples, natural_max};
