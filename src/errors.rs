//! Error types shared by the object model.
//!
//! Errors are stage-specific to keep diagnostics precise: the pack, pack
//! index, staging index, ref, config, and repository layers each define
//! their own enum next to their parser. This module holds the one enum
//! every object codec shares. All enums are `#[non_exhaustive]` so variants
//! can be added without breaking callers.
//!
//! # Design Notes
//! - Variants with `detail` carry human-readable context and are not stable
//!   for machine parsing.
//! - I/O errors preserve their source to keep diagnostics actionable.
//! - Each error is constructed at the point of detection and surfaced
//!   unchanged; no layer rewraps another layer's failure as its own.

use std::fmt;
use std::io;

/// Errors from decoding or constructing Git objects and their envelopes.
///
/// Covers the byte-shape violations of the object layer: checksums, modes,
/// person stamps, field blocks, and the stream envelope itself.
#[derive(Debug)]
#[non_exhaustive]
pub enum ObjectError {
    /// I/O error during file operations.
    Io(io::Error),
    /// A SHA-1 checksum is not 40 lowercase hex characters.
    MalformedSha1 { detail: &'static str },
    /// A file mode is not a valid octal number.
    MalformedMode { detail: &'static str },
    /// An author or person-time stamp is not well-formed.
    MalformedPerson { detail: &'static str },
    /// A field block, tree entry, or envelope violates its byte shape.
    MalformedField { detail: &'static str },
    /// The stream envelope names a type other than blob, tree, commit, tag.
    UnknownObjectType { found: String },
    /// A commit or tag field name outside the expected vocabulary.
    UnrecognizedField { name: String },
}

impl ObjectError {
    /// Constructs a malformed-field error with a static detail string.
    #[inline]
    pub const fn field(detail: &'static str) -> Self {
        Self::MalformedField { detail }
    }
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::MalformedSha1 { detail } => write!(f, "malformed SHA-1: {detail}"),
            Self::MalformedMode { detail } => write!(f, "malformed mode: {detail}"),
            Self::MalformedPerson { detail } => write!(f, "malformed person: {detail}"),
            Self::MalformedField { detail } => write!(f, "malformed field: {detail}"),
            Self::UnknownObjectType { found } => {
                write!(f, "{found:?} is not a known object type")
            }
            Self::UnrecognizedField { name } => {
                write!(f, "unrecognized field {name:?}")
            }
        }
    }
}

impl std::error::Error for ObjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ObjectError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
