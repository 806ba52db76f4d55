//! JSON sidecar attribute source.
//!
//! Reads `<file>.json` next to each container file. The sidecar holds the
//! already-decoded attribute records of the file in the DICOM keyword form
//! accepted by [`AttributeSet`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{AttributeError, IoError};
use crate::io::{FileSource, RangeReader};

use super::{AttributeScope, AttributeSet, AttributeSource};

/// Extension of sidecar files.
pub const SIDECAR_EXTENSION: &str = "json";

/// Path of the sidecar for `path`.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    PathBuf::from(name)
}

/// [`AttributeSource`] reading JSON sidecars through a [`FileSource`].
pub struct SidecarAttributeSource<F> {
    files: F,
}

impl<F: FileSource> SidecarAttributeSource<F> {
    pub fn new(files: F) -> Self {
        Self { files }
    }
}

#[async_trait]
impl<F: FileSource> AttributeSource for SidecarAttributeSource<F> {
    async fn read_attributes(
        &self,
        path: &Path,
        scope: AttributeScope,
    ) -> Result<AttributeSet, AttributeError> {
        let sidecar = sidecar_path(path);
        let reader = match self.files.create_reader(&sidecar).await {
            Ok(reader) => reader,
            Err(IoError::NotFound(_)) => return Err(AttributeError::Missing(path.to_path_buf())),
            Err(e) => return Err(e.into()),
        };

        let bytes = reader.read_exact_at(0, reader.size() as usize).await?;
        let attrs: AttributeSet =
            serde_json::from_slice(&bytes).map_err(|e| AttributeError::Parse {
                path: sidecar.clone(),
                message: e.to_string(),
            })?;

        Ok(attrs.project(scope))
    }
}
