//! Sibling file resolution.
//!
//! Decides which files make up one logical series, either from a directory
//! index or by comparing grouping attributes of same-type files in the
//! opened file's directory.

mod directory;
mod key;
mod resolver;

pub use directory::{is_directory_index, resolve_file_id, DirectoryIndex, DIRECTORY_INDEX_NAME};
pub use key::{parse_time, uid_prefix, MatchOptions, Rejection, SeriesKey, DEFAULT_TIME_TOLERANCE};
pub use resolver::{
    assemble, classify_candidate, classify_siblings, list_candidates, resolve_series,
    Classification, SeriesFileList, SiblingDecision,
};
