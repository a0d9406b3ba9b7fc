//! Staging index (`DIRC` file) reading.
//!
//! The index records the working-tree snapshot staged for the next commit:
//! one entry per path with stat data, a checksum, and flags, followed by
//! optional extensions and a whole-file SHA-1 trailer.
//!
//! # Layout
//! ```text
//! +--------------------+
//! | "DIRC" (4B)        |
//! | Version (4B BE)    |  2
//! | Entry count (4B)   |
//! +--------------------+
//! | Entries            |  62-byte header [+2B v3 flags] + path + padding
//! +--------------------+
//! | Extensions         |  { signature[4], u32 size, data[size] } each
//! +--------------------+
//! | SHA-1 (20B)        |  over all preceding bytes
//! +--------------------+
//! ```
//!
//! Each entry is NUL-padded so its total on-disk length is a multiple of
//! eight; the padding bytes must all be NUL.
//!
//! # Extensions
//! An extension whose signature starts with an uppercase ASCII letter is
//! optional and its payload is retained uninterpreted. An unknown
//! extension that is not optional is fatal. Interpretation of extension
//! contents is out of scope.
//!
//! # Trailer Detection
//! The reader operates on the fully-loaded file, so the trailer is simply
//! the final twenty bytes: the checksum is verified up front against
//! `len - 20`, and the extension loop ends when exactly twenty bytes
//! remain. No look-ahead heuristics are involved.

use std::fmt;
use std::io;
use std::path::Path;

use memchr::memchr;
use sha1::{Digest, Sha1 as Sha1Hasher};

use crate::mode::GitMode;
use crate::object_id::Sha1;

/// Fixed portion of a v2 entry: ten stat words, a checksum, and flags.
const ENTRY_FIXED_SIZE: usize = 10 * 4 + Sha1::LEN + 2;

/// Errors from staging index decoding.
#[derive(Debug)]
#[non_exhaustive]
pub enum IndexError {
    /// I/O error reading the index file.
    Io(io::Error),
    /// The file is structurally malformed.
    Corrupt { detail: &'static str },
    /// The trailing SHA-1 does not match the preceding bytes.
    IndexFileChecksumMismatch { expected: Sha1, actual: Sha1 },
    /// An unknown extension whose signature marks it mandatory.
    NonOptionalExtension { signature: [u8; 4] },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Corrupt { detail } => write!(f, "corrupt index: {detail}"),
            Self::IndexFileChecksumMismatch { expected, actual } => {
                write!(f, "index SHA-1 was {actual}, expected {expected}")
            }
            Self::NonOptionalExtension { signature } => {
                write!(
                    f,
                    "cannot handle non-optional index extension {}",
                    String::from_utf8_lossy(signature)
                )
            }
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for IndexError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// The 16-bit flags word of an index entry.
///
/// Bit layout, MSB first: `[assume_valid:1, extended:1, stage:2,
/// name_len:12]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexFlags(u16);

impl IndexFlags {
    /// Returns the raw flags word.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// The assume-valid (assume-unchanged) bit.
    #[must_use]
    pub const fn assume_valid(self) -> bool {
        (self.0 >> 15) & 1 == 1
    }

    /// True when a v3 flags word follows the fixed header.
    #[must_use]
    pub const fn extended(self) -> bool {
        (self.0 >> 14) & 1 == 1
    }

    /// The merge stage (0 for a normal entry).
    #[must_use]
    pub const fn stage(self) -> u8 {
        ((self.0 >> 12) & 0x3) as u8
    }

    /// The path length, capped at 0xFFF for longer paths.
    #[must_use]
    pub const fn name_len(self) -> u16 {
        self.0 & 0xfff
    }
}

/// The extra 16-bit flags word of a v3 entry.
///
/// Bit layout, MSB first: `[reserved:1, skip_worktree:1, intent_to_add:1,
/// reserved:13]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexV3Flags(u16);

impl IndexV3Flags {
    /// Returns the raw flags word.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// The sparse-checkout skip-worktree bit.
    #[must_use]
    pub const fn skip_worktree(self) -> bool {
        (self.0 >> 14) & 1 == 1
    }

    /// The `git add -N` intent-to-add bit.
    #[must_use]
    pub const fn intent_to_add(self) -> bool {
        (self.0 >> 13) & 1 == 1
    }
}

/// One staged path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub ctime_secs: u32,
    pub ctime_nsecs: u32,
    pub mtime_secs: u32,
    pub mtime_nsecs: u32,
    pub dev: u32,
    pub ino: u32,
    pub mode: GitMode,
    pub uid: u32,
    pub gid: u32,
    pub file_size: u32,
    pub sha: Sha1,
    pub flags: IndexFlags,
    /// Present only when `flags.extended()` is set.
    pub v3_flags: Option<IndexV3Flags>,
    pub path: String,
    /// Total on-disk length including padding; always a multiple of 8.
    pub on_disk_len: usize,
}

/// An index extension, retained uninterpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexExtension {
    pub signature: [u8; 4],
    pub data: Vec<u8>,
}

impl IndexExtension {
    /// An extension is optional when its signature starts with an
    /// uppercase ASCII letter; a reader that does not understand it may
    /// skip it.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.signature[0].is_ascii_uppercase()
    }
}

/// A decoded staging index file.
#[derive(Clone, Debug)]
pub struct IndexFile {
    version: u32,
    entries: Vec<IndexEntry>,
    extensions: Vec<IndexExtension>,
    checksum: Sha1,
}

impl IndexFile {
    /// Reads and decodes an index file.
    pub fn from_path(path: &Path) -> Result<Self, IndexError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Decodes an index file from its full byte contents.
    ///
    /// The trailing checksum is verified before any parsing.
    ///
    /// # Errors
    /// - `IndexFileChecksumMismatch` if the trailer fails to verify.
    /// - `Corrupt` for structural violations.
    /// - `NonOptionalExtension` for a mandatory unknown extension.
    pub fn from_bytes(data: &[u8]) -> Result<Self, IndexError> {
        if data.len() < 12 + Sha1::LEN {
            return Err(IndexError::Corrupt {
                detail: "file too small",
            });
        }

        let body_end = data.len() - Sha1::LEN;
        let checksum = Sha1::from_bytes(&data[body_end..]);
        let actual = Sha1::from_bytes(&Sha1Hasher::digest(&data[..body_end]));
        if checksum != actual {
            return Err(IndexError::IndexFileChecksumMismatch {
                expected: checksum,
                actual,
            });
        }

        if &data[..4] != b"DIRC" {
            return Err(IndexError::Corrupt {
                detail: "bad signature",
            });
        }
        let version = read_u32(data, 4);
        if version != 2 {
            return Err(IndexError::Corrupt {
                detail: "unsupported index version",
            });
        }
        let entry_count = read_u32(data, 8);

        let mut pos = 12;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let entry = decode_entry(&data[..body_end], pos)?;
            pos += entry.on_disk_len;
            entries.push(entry);
        }

        let extensions = decode_extensions(&data[..body_end], pos)?;

        Ok(Self {
            version,
            entries,
            extensions,
            checksum,
        })
    }

    /// Returns the index format version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the staged entries in file order.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Returns the retained extensions in file order.
    #[must_use]
    pub fn extensions(&self) -> &[IndexExtension] {
        &self.extensions
    }

    /// Returns the verified trailing checksum.
    #[must_use]
    pub fn checksum(&self) -> Sha1 {
        self.checksum
    }

    /// Returns the staged path names in file order.
    #[must_use]
    pub fn pathnames(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.path.as_str()).collect()
    }
}

/// Decodes one entry starting at `pos`, padding included.
fn decode_entry(data: &[u8], pos: usize) -> Result<IndexEntry, IndexError> {
    let truncated = IndexError::Corrupt {
        detail: "truncated entry",
    };

    if pos + ENTRY_FIXED_SIZE > data.len() {
        return Err(truncated);
    }

    let stat = |i: usize| read_u32(data, pos + i * 4);
    let sha = Sha1::from_bytes(&data[pos + 40..pos + 40 + Sha1::LEN]);
    let flags = IndexFlags(read_u16(data, pos + 60));

    let mut header_len = ENTRY_FIXED_SIZE;
    let v3_flags = if flags.extended() {
        if pos + header_len + 2 > data.len() {
            return Err(truncated);
        }
        let raw = read_u16(data, pos + header_len);
        header_len += 2;
        Some(IndexV3Flags(raw))
    } else {
        None
    };

    let path_start = pos + header_len;
    let nul = memchr(0, &data[path_start..]).ok_or(IndexError::Corrupt {
        detail: "entry path is not terminated",
    })?;
    let path = std::str::from_utf8(&data[path_start..path_start + nul])
        .map_err(|_| IndexError::Corrupt {
            detail: "entry path is not UTF-8",
        })?
        .to_string();

    // Pad the whole entry, terminating NUL included, to a multiple of 8.
    let unpadded = header_len + nul + 1;
    let on_disk_len = (unpadded + 7) & !7;
    if pos + on_disk_len > data.len() {
        return Err(truncated);
    }
    for &byte in &data[pos + unpadded..pos + on_disk_len] {
        if byte != 0 {
            return Err(IndexError::Corrupt {
                detail: "entry padding is not NUL",
            });
        }
    }

    Ok(IndexEntry {
        ctime_secs: stat(0),
        ctime_nsecs: stat(1),
        mtime_secs: stat(2),
        mtime_nsecs: stat(3),
        dev: stat(4),
        ino: stat(5),
        mode: GitMode::new(stat(6)),
        uid: stat(7),
        gid: stat(8),
        file_size: stat(9),
        sha,
        flags,
        v3_flags,
        path,
        on_disk_len,
    })
}

/// Decodes extensions from `pos` to the end of the body.
///
/// `data` excludes the trailer, so the loop simply runs the body out.
fn decode_extensions(data: &[u8], mut pos: usize) -> Result<Vec<IndexExtension>, IndexError> {
    let mut extensions = Vec::new();

    while pos < data.len() {
        if pos + 8 > data.len() {
            return Err(IndexError::Corrupt {
                detail: "truncated extension header",
            });
        }
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[pos..pos + 4]);
        let size = read_u32(data, pos + 4) as usize;
        pos += 8;

        if pos + size > data.len() {
            return Err(IndexError::Corrupt {
                detail: "extension data runs past end of file",
            });
        }
        let extension = IndexExtension {
            signature,
            data: data[pos..pos + size].to_vec(),
        };
        pos += size;

        if !extension.is_optional() {
            return Err(IndexError::NonOptionalExtension { signature });
        }
        extensions.push(extension);
    }

    Ok(extensions)
}

#[inline]
fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

#[inline]
fn read_u16(data: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([data[pos], data[pos + 1]])
}
