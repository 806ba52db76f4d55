//! DICOM attribute model.
//!
//! This module defines the decoded attribute records the engine consumes,
//! the [`AttributeSource`] seam through which they arrive, and the
//! classification of transfer syntaxes into codecs.

mod attributes;
mod sidecar;
pub mod syntax;

pub use attributes::{
    AttributeScope, AttributeSet, AttributeSource, DirectoryRecord, FrameAttributes,
};
pub use sidecar::{sidecar_path, SidecarAttributeSource, SIDECAR_EXTENSION};
pub use syntax::{classify, ByteOrder, Codec};
