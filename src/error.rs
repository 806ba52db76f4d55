use std::path::PathBuf;

use thiserror::Error;

/// I/O errors that can occur when reading container files
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// File or directory does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Any other failure reported by the operating system
    #[error("Read error: {0}")]
    Read(String),
}

impl IoError {
    /// Convert a `std::io::Error` for the given path.
    pub fn from_std(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(path.display().to_string())
        } else {
            IoError::Read(format!("{}: {}", path.display(), err))
        }
    }
}

/// Errors produced by an attribute source
#[derive(Debug, Clone, Error)]
pub enum AttributeError {
    /// I/O error while reading the attribute records
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// No attribute records exist for the file
    #[error("No attributes available for {0}")]
    Missing(PathBuf),

    /// Attribute records could not be decoded
    #[error("Invalid attributes for {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Errors that prevent a series from being opened
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// I/O error while building the index
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Attribute decoding failed for the opened file
    #[error("Attribute error: {0}")]
    Attribute(#[from] AttributeError),

    /// None of the series files carried usable image attributes
    #[error("No usable image files in series")]
    NoUsableFiles,

    /// The series declares no frames at all
    #[error("Series contains no frames")]
    NoFrames,

    /// Declared geometry is unusable
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Reader options are inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Byte-range resolution did not locate a single tile
    #[error("No tiles could be located in {files} file(s)")]
    NoTilesLocated { files: usize },
}

/// Errors raised while decoding one tile
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The tile's codec has no decoder
    #[error("Compression not supported: {0}")]
    UnsupportedCompression(String),

    /// The tile's byte range was never located
    #[error("Tile data was not located: {0}")]
    Unlocated(String),

    /// I/O error while reading tile bytes
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Tile bytes are truncated or structurally invalid
    #[error("Malformed tile data: {message}")]
    Malformed { message: String },

    /// The baseline JPEG decoder rejected the stream
    #[error("JPEG decode failed: {0}")]
    Jpeg(String),

    /// The JPEG 2000 decoder rejected the stream
    #[error("JPEG 2000 decode failed: {0}")]
    Jpeg2000(String),
}

impl DecodeError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        DecodeError::Malformed {
            message: message.into(),
        }
    }
}

/// Errors returned from plane reads
#[derive(Debug, Clone, Error)]
pub enum ReadError {
    /// Plane index is not below the series plane count
    #[error("Plane {plane} out of range (series has {count} planes)")]
    PlaneOutOfRange { plane: usize, count: usize },

    /// Requested rectangle leaves the canvas or is empty
    #[error("Region {x},{y} {width}x{height} outside canvas {canvas_width}x{canvas_height}")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },

    /// Destination buffer cannot hold the requested rectangle
    #[error("Buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    /// A tile in the request uses a codec that cannot be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}
