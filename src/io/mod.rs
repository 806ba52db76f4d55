mod cursor;
mod local;
mod range_reader;
mod source;

pub use cursor::{ForwardCursor, SCAN_CHUNK_SIZE};
pub use local::{LocalFileReader, LocalFileSource};
pub use range_reader::{read_u16_le, read_u32_le, RangeReader};
pub use source::FileSource;
