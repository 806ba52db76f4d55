//! Transfer syntax classification.
//!
//! A transfer syntax UID determines both the codec of the pixel data and
//! the byte order of uncompressed samples. Encapsulated syntaxes are always
//! little-endian.

use std::fmt;

use serde::Serialize;

/// Compression of one tile's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Uncompressed samples.
    Raw,
    /// Byte-plane PackBits ("RLE Lossless").
    Rle,
    /// Baseline/extended JPEG.
    Jpeg,
    /// JPEG 2000 (including high-throughput JPEG 2000).
    Jpeg2000,
    /// Deflated explicit little-endian. Recognized but not decodable.
    Deflate,
    /// Any transfer syntax without a decoder.
    Unrecognized(String),
}

impl Codec {
    /// Whether the tile decoder can decode this codec.
    pub fn is_supported(&self) -> bool {
        matches!(self, Codec::Raw | Codec::Rle | Codec::Jpeg | Codec::Jpeg2000)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Raw => write!(f, "raw"),
            Codec::Rle => write!(f, "rle"),
            Codec::Jpeg => write!(f, "jpeg"),
            Codec::Jpeg2000 => write!(f, "jpeg2000"),
            Codec::Deflate => write!(f, "deflate"),
            Codec::Unrecognized(uid) => write!(f, "unrecognized ({})", uid),
        }
    }
}

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

// =============================================================================
// Transfer Syntax UIDs
// =============================================================================

pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";
pub const RLE_LOSSLESS: &str = "1.2.840.10008.1.2.5";

const ENCAPSULATED_PREFIX: &str = "1.2.840.10008.1.2.4.";

/// Classify a transfer syntax UID.
///
/// A missing UID is treated as implicit VR little-endian, the default
/// transfer syntax.
pub fn classify(transfer_syntax: Option<&str>) -> (Codec, ByteOrder) {
    let uid = match transfer_syntax {
        Some(uid) => uid.trim().trim_end_matches('\0'),
        None => return (Codec::Raw, ByteOrder::Little),
    };

    match uid {
        "" | IMPLICIT_VR_LITTLE_ENDIAN | EXPLICIT_VR_LITTLE_ENDIAN => {
            (Codec::Raw, ByteOrder::Little)
        }
        EXPLICIT_VR_BIG_ENDIAN => (Codec::Raw, ByteOrder::Big),
        DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => (Codec::Deflate, ByteOrder::Little),
        RLE_LOSSLESS => (Codec::Rle, ByteOrder::Little),
        _ => match uid.strip_prefix(ENCAPSULATED_PREFIX) {
            Some(suffix) => (classify_encapsulated(uid, suffix), ByteOrder::Little),
            None => (Codec::Unrecognized(uid.to_string()), ByteOrder::Little),
        },
    }
}

fn classify_encapsulated(uid: &str, suffix: &str) -> Codec {
    let number: u32 = match suffix.parse() {
        Ok(n) => n,
        Err(_) => return Codec::Unrecognized(uid.to_string()),
    };

    match number {
        // JPEG-LS
        80 | 81 => Codec::Unrecognized(uid.to_string()),
        // JPEG 2000 and HTJ2K
        90..=99 | 201..=203 => Codec::Jpeg2000,
        // MPEG-2, MPEG-4, HEVC video
        100..=108 => Codec::Unrecognized(uid.to_string()),
        _ => Codec::Jpeg,
    }
}
