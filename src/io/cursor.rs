//! Buffered forward cursor over a [`RangeReader`].
//!
//! The byte-range resolver and the run-length decoder walk frames
//! sequentially without knowing their lengths up front. The cursor serves
//! those walks from fixed-size chunks so that each small peek does not turn
//! into its own read call.

use bytes::Bytes;

use crate::error::IoError;

use super::RangeReader;

/// Chunk size for sequential scans (8 KiB).
pub const SCAN_CHUNK_SIZE: usize = 8 * 1024;

/// Sequential reader with an explicit position.
pub struct ForwardCursor<'a, R: RangeReader + ?Sized> {
    reader: &'a R,
    buf: Bytes,
    buf_start: u64,
    pos: u64,
}

impl<'a, R: RangeReader + ?Sized> ForwardCursor<'a, R> {
    /// Create a cursor positioned at `pos`.
    pub fn new(reader: &'a R, pos: u64) -> Self {
        Self {
            reader,
            buf: Bytes::new(),
            buf_start: pos,
            pos,
        }
    }

    /// Current absolute file offset.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Total size of the underlying file.
    pub fn len(&self) -> u64 {
        self.reader.size()
    }

    pub fn is_empty(&self) -> bool {
        self.reader.size() == 0
    }

    /// Whether the cursor has reached the end of the file.
    pub fn is_eof(&self) -> bool {
        self.pos >= self.reader.size()
    }

    /// Move to an absolute offset. Buffered data is kept if it still covers
    /// the new position.
    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    /// Advance the position by `n` bytes.
    pub fn advance(&mut self, n: usize) {
        self.pos += n as u64;
    }

    /// Return the buffered bytes from the current position onward, reading
    /// the next chunk when the buffer is exhausted.
    ///
    /// An empty result means end of file.
    pub async fn fill(&mut self) -> Result<Bytes, IoError> {
        let end = self.buf_start + self.buf.len() as u64;
        if self.pos < self.buf_start || self.pos >= end {
            self.buf = self.reader.read_at_most(self.pos, SCAN_CHUNK_SIZE).await?;
            self.buf_start = self.pos;
        }
        let start = (self.pos - self.buf_start) as usize;
        Ok(self.buf.slice(start..))
    }

    /// Look at up to `n` bytes at the current position without advancing.
    ///
    /// Fewer than `n` bytes are returned only at end of file.
    pub async fn peek(&mut self, n: usize) -> Result<Bytes, IoError> {
        let end = self.buf_start + self.buf.len() as u64;
        if self.pos < self.buf_start || self.pos + n as u64 > end {
            self.buf = self
                .reader
                .read_at_most(self.pos, n.max(SCAN_CHUNK_SIZE))
                .await?;
            self.buf_start = self.pos;
        }
        let start = (self.pos - self.buf_start) as usize;
        let stop = (start + n).min(self.buf.len());
        Ok(self.buf.slice(start..stop))
    }

    /// Skip a run of zero bytes. Returns the number of bytes skipped.
    pub async fn skip_zeros(&mut self) -> Result<u64, IoError> {
        let mut skipped = 0u64;
        loop {
            let chunk = self.fill().await?;
            if chunk.is_empty() {
                break;
            }
            let zeros = chunk.iter().take_while(|&&b| b == 0).count();
            self.advance(zeros);
            skipped += zeros as u64;
            if zeros < chunk.len() {
                break;
            }
        }
        Ok(skipped)
    }
}
