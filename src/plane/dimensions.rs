//! Plane index mapping.

use serde::Serialize;

/// Maps linear plane indices to (z, c, t) coordinates in XYCZT order:
/// channel varies fastest, then depth, then time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DimensionIndexer {
    pub size_z: usize,
    pub size_c: usize,
    pub size_t: usize,
}

impl DimensionIndexer {
    /// Indexer for one time point. Zero sizes count as one.
    pub fn new(size_z: usize, size_c: usize) -> Self {
        Self {
            size_z: size_z.max(1),
            size_c: size_c.max(1),
            size_t: 1,
        }
    }

    pub fn plane_count(&self) -> usize {
        self.size_z * self.size_c * self.size_t
    }

    /// (z, c, t) of `plane`, or `None` when it is out of range.
    pub fn coordinates(&self, plane: usize) -> Option<(usize, usize, usize)> {
        if plane >= self.plane_count() {
            return None;
        }
        let c = plane % self.size_c;
        let z = (plane / self.size_c) % self.size_z;
        let t = plane / (self.size_c * self.size_z);
        Some((z, c, t))
    }

    /// Linear index of (z, c, t).
    pub fn index(&self, z: usize, c: usize, t: usize) -> usize {
        (t * self.size_z + z) * self.size_c + c
    }
}
