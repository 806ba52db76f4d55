//! Configuration for the tile reader.
//!
//! The library is configured through [`ReaderConfig`]. The `dicom-tiles`
//! binary builds one from command-line arguments, each of which can also be
//! set through an environment variable with the `DICOM_TILES_` prefix:
//!
//! - `DICOM_TILES_NO_GROUPING` - Open only the given file
//! - `DICOM_TILES_NO_SERIES_CHECK` - Ignore series numbers when grouping
//! - `DICOM_TILES_TIME_TOLERANCE` - Grouping time tolerance in seconds (default: 150)
//! - `DICOM_TILES_SEARCH_PARENT` - Also scan sibling directories
//! - `DICOM_TILES_CACHE_TILES` - Decoded tiles kept per series (default: 1)
//! - `DICOM_TILES_LAYOUT` - Output layout: `interleaved` or `planar`
//!
//! # Example
//!
//! ```
//! use dicom_tile_reader::config::ReaderConfig;
//!
//! let config = ReaderConfig {
//!     check_series_number: false,
//!     ..ReaderConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::codec::PixelLayout;
use crate::series::{MatchOptions, DEFAULT_TIME_TOLERANCE};

// =============================================================================
// Default Values
// =============================================================================

/// Default number of decoded tiles kept per series.
pub const DEFAULT_DECODED_TILE_CACHE: usize = 1;

// =============================================================================
// Reader Configuration
// =============================================================================

/// Options for opening and reading a series.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// Group sibling files into a multi-file series.
    pub group_files: bool,

    /// Require equal series numbers when grouping.
    pub check_series_number: bool,

    /// Maximum acquisition time difference between grouped files.
    pub time_tolerance: Duration,

    /// Also scan the sibling directories of the file's directory.
    pub search_parent_directory: bool,

    /// Number of fully decoded tiles kept per series.
    pub decoded_tile_cache: usize,

    /// Output sample layout. `None` keeps the series' native layout.
    pub layout: Option<PixelLayout>,

    /// Which non-empty series of a directory index to open.
    pub directory_series: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            group_files: true,
            check_series_number: true,
            time_tolerance: DEFAULT_TIME_TOLERANCE,
            search_parent_directory: false,
            decoded_tile_cache: DEFAULT_DECODED_TILE_CACHE,
            layout: None,
            directory_series: 0,
        }
    }
}

impl ReaderConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.decoded_tile_cache == 0 {
            return Err("decoded_tile_cache must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Grouping rules derived from this configuration.
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            check_series_number: self.check_series_number,
            time_tolerance: self.time_tolerance,
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// dicom-tiles - Random-access reader for tiled DICOM images.
#[derive(Parser, Debug, Clone)]
#[command(name = "dicom-tiles")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print series metadata as JSON.
    Info(InfoArgs),

    /// List the files backing a series.
    Files(InfoArgs),

    /// Decode a region of one plane to a raw sample file.
    Read(ReadArgs),
}

/// Arguments of the `info` and `files` subcommands.
#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    /// Any file of the series, or a DICOMDIR.
    pub path: PathBuf,

    #[command(flatten)]
    pub reader: ReaderArgs,
}

/// Arguments of the `read` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Any file of the series, or a DICOMDIR.
    pub path: PathBuf,

    /// Plane index (channel fastest, then focal plane).
    #[arg(long, default_value_t = 0)]
    pub plane: usize,

    /// Left edge of the region.
    #[arg(long, default_value_t = 0)]
    pub x: u32,

    /// Top edge of the region.
    #[arg(long, default_value_t = 0)]
    pub y: u32,

    /// Region width. Defaults to the rest of the canvas.
    #[arg(long)]
    pub width: Option<u32>,

    /// Region height. Defaults to the rest of the canvas.
    #[arg(long)]
    pub height: Option<u32>,

    /// Output file for the raw samples.
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub reader: ReaderArgs,
}

/// Output layout accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutArg {
    Interleaved,
    Planar,
}

impl From<LayoutArg> for PixelLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Interleaved => PixelLayout::Interleaved,
            LayoutArg::Planar => PixelLayout::Planar,
        }
    }
}

/// Reader options shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct ReaderArgs {
    /// Open only the given file instead of grouping siblings.
    #[arg(long, default_value_t = false, env = "DICOM_TILES_NO_GROUPING")]
    pub no_grouping: bool,

    /// Ignore series numbers when grouping.
    #[arg(long, default_value_t = false, env = "DICOM_TILES_NO_SERIES_CHECK")]
    pub no_series_check: bool,

    /// Grouping time tolerance in seconds.
    #[arg(long, default_value_t = DEFAULT_TIME_TOLERANCE.as_secs(), env = "DICOM_TILES_TIME_TOLERANCE")]
    pub time_tolerance: u64,

    /// Also scan sibling directories for series files.
    #[arg(long, default_value_t = false, env = "DICOM_TILES_SEARCH_PARENT")]
    pub search_parent: bool,

    /// Number of decoded tiles kept in memory.
    #[arg(long, default_value_t = DEFAULT_DECODED_TILE_CACHE, env = "DICOM_TILES_CACHE_TILES")]
    pub cache_tiles: usize,

    /// Output sample layout (defaults to the native layout).
    #[arg(long, value_enum, env = "DICOM_TILES_LAYOUT")]
    pub layout: Option<LayoutArg>,

    /// Which series of a DICOMDIR to open.
    #[arg(long, default_value_t = 0, env = "DICOM_TILES_DIRECTORY_SERIES")]
    pub directory_series: usize,
}

impl ReaderArgs {
    /// Build the library configuration.
    pub fn to_config(&self) -> ReaderConfig {
        ReaderConfig {
            group_files: !self.no_grouping,
            check_series_number: !self.no_series_check,
            time_tolerance: Duration::from_secs(self.time_tolerance),
            search_parent_directory: self.search_parent,
            decoded_tile_cache: self.cache_tiles,
            layout: self.layout.map(PixelLayout::from),
            directory_series: self.directory_series,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
