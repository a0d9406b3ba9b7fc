//! Pack index readers, versions 1 and 2.
//!
//! A pack index is the companion file that makes random access into a pack
//! possible: given an object's SHA-1 it yields the byte offset of the
//! object's entry in the pack file.
//!
//! # Layout (v1)
//! ```text
//! +------------------+
//! | Fanout (1024B)   |  256 * u32 BE cumulative counts
//! +------------------+
//! | Records          |  N * { u32 BE offset, 20-byte SHA-1 }
//! +------------------+
//! | Pack SHA-1 (20B) |
//! | Self SHA-1 (20B) |
//! +------------------+
//! ```
//!
//! # Layout (v2)
//! ```text
//! +------------------+
//! | Magic (4B)       |  0xff 't' 'O' 'c'
//! | Version (4B)     |  BE 2
//! +------------------+
//! | Fanout (1024B)   |
//! +------------------+
//! | SHA-1 table      |  N * 20 bytes, sorted
//! | CRC-32 table     |  N * 4 bytes
//! | Offset table     |  N * 4 bytes (MSB set = higher-offset index)
//! | Higher offsets   |  K * 8 bytes (packs over 2 GiB)
//! +------------------+
//! | Pack SHA-1 (20B) |
//! | Self SHA-1 (20B) |
//! +------------------+
//! ```
//!
//! The v2 tables are parallel arrays rather than interleaved records for
//! cache locality during the binary search.
//!
//! # Version Detection
//! The first four bytes are peeked: the v2 magic selects v2, anything else
//! is decoded as v1. The magic deliberately reads as an impossible fanout
//! value, so a v1 file can never be mistaken for v2.
//!
//! # Invariants
//! - The fanout is non-decreasing and `fanout[255]` equals the record count.
//! - `fanout[b-1]..fanout[b]` brackets the objects whose first byte is `b`.
//! - The trailing self checksum matches the SHA-1 of all preceding bytes;
//!   decoding verifies this before anything is returned.

use std::fmt;
use std::io;
use std::path::Path;

use sha1::{Digest, Sha1 as Sha1Hasher};

use crate::object_id::{Crc32, Sha1};

/// Magic bytes opening a v2 pack index.
pub const V2_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];

/// Fanout table length in bytes.
const FANOUT_SIZE: usize = 256 * 4;

/// Two trailing SHA-1 checksums.
const TRAILER_SIZE: usize = 2 * Sha1::LEN;

/// Flag bit marking an offset as an index into the higher-offset table.
const HIGHER_OFFSET_FLAG: u32 = 0x8000_0000;

/// Errors from pack index decoding and position queries.
#[derive(Debug)]
#[non_exhaustive]
pub enum PackIndexError {
    /// I/O error reading the index file.
    Io(io::Error),
    /// The index is structurally malformed.
    InvalidPackIndexHeader { detail: &'static str },
    /// A v2 magic followed by a version other than 2.
    UnsupportedPackIndexVersion { version: u32 },
    /// The trailing self checksum does not match the preceding bytes.
    PackIndexChecksumMismatch { expected: Sha1, actual: Sha1 },
    /// A position query out of the index's range.
    InvalidPackIndexPos { pos: usize },
}

impl PackIndexError {
    /// Constructs a header error with a static detail string.
    #[inline]
    pub const fn invalid(detail: &'static str) -> Self {
        Self::InvalidPackIndexHeader { detail }
    }
}

impl fmt::Display for PackIndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::InvalidPackIndexHeader { detail } => {
                write!(f, "invalid pack index: {detail}")
            }
            Self::UnsupportedPackIndexVersion { version } => {
                write!(f, "unsupported pack index version {version}")
            }
            Self::PackIndexChecksumMismatch { expected, actual } => {
                write!(f, "pack index SHA-1 is {actual}, expected {expected}")
            }
            Self::InvalidPackIndexPos { pos } => {
                write!(f, "invalid pack index position {pos}")
            }
        }
    }
}

impl std::error::Error for PackIndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PackIndexError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// One record from a pack index.
///
/// Only `offset` and `sha` are meaningful in every version; v1 indices
/// carry no CRC-32s and report the empty checksum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackIndexEntry {
    /// Byte offset of the entry in the companion pack file.
    pub offset: u64,
    /// Checksum of the object at that offset.
    pub sha: Sha1,
    /// CRC-32 of the raw packed entry; empty for v1 indices.
    pub crc32: Crc32,
}

/// A decoded pack index of either version.
#[derive(Clone, Debug)]
pub enum PackIndex {
    V1(PackIndexV1),
    V2(PackIndexV2),
}

impl PackIndex {
    /// Decodes a pack index, detecting the version from the leading bytes.
    ///
    /// # Errors
    /// - `InvalidPackIndexHeader` for structural problems.
    /// - `UnsupportedPackIndexVersion` for a v2 magic with a bad version.
    /// - `PackIndexChecksumMismatch` if the trailing checksum fails.
    pub fn from_bytes(data: &[u8]) -> Result<Self, PackIndexError> {
        verify_self_checksum(data)?;

        if data.len() >= 4 && data[..4] == V2_MAGIC {
            PackIndexV2::decode(data).map(Self::V2)
        } else {
            PackIndexV1::decode(data).map(Self::V1)
        }
    }

    /// Reads and decodes an index file.
    ///
    /// The file is read in full and its handle closed before decoding; the
    /// parsed index holds no file state.
    pub fn from_path(path: &Path) -> Result<Self, PackIndexError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Returns the index format version.
    #[must_use]
    pub fn version(&self) -> u32 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
        }
    }

    /// Returns the number of objects in the index.
    #[must_use]
    pub fn size(&self) -> usize {
        self.objects().len()
    }

    /// Returns the sorted object checksums.
    #[must_use]
    pub fn objects(&self) -> &[Sha1] {
        match self {
            Self::V1(idx) => &idx.shas,
            Self::V2(idx) => &idx.shas,
        }
    }

    /// Returns the checksum of the companion pack file.
    #[must_use]
    pub fn packfile_sha1(&self) -> Sha1 {
        match self {
            Self::V1(idx) => idx.packfile_sha1,
            Self::V2(idx) => idx.packfile_sha1,
        }
    }

    /// Looks up an object by checksum.
    ///
    /// The fanout brackets the sorted window for the checksum's first
    /// byte; the window is then binary-searched. Not finding the object
    /// is a legal result.
    #[must_use]
    pub fn lookup(&self, sha: &Sha1) -> Option<PackIndexEntry> {
        let pos = self.position_of(sha)?;
        Some(self.entry_unchecked(pos))
    }

    /// Returns the pack offset for an object, if present.
    #[must_use]
    pub fn offset_for(&self, sha: &Sha1) -> Option<u64> {
        self.lookup(sha).map(|entry| entry.offset)
    }

    /// Returns the recorded CRC-32 for an object, if present.
    ///
    /// Always the empty checksum for v1 indices.
    #[must_use]
    pub fn crc32_for(&self, sha: &Sha1) -> Option<Crc32> {
        self.lookup(sha).map(|entry| entry.crc32)
    }

    /// Returns the entry at an abstract position in the sorted order.
    ///
    /// # Errors
    /// Returns `InvalidPackIndexPos` when `pos` is out of range.
    pub fn entry_at(&self, pos: usize) -> Result<PackIndexEntry, PackIndexError> {
        if pos >= self.size() {
            return Err(PackIndexError::InvalidPackIndexPos { pos });
        }
        Ok(self.entry_unchecked(pos))
    }

    fn position_of(&self, sha: &Sha1) -> Option<usize> {
        let (fanout, shas) = match self {
            Self::V1(idx) => (&idx.fanout, &idx.shas),
            Self::V2(idx) => (&idx.fanout, &idx.shas),
        };

        let first = sha.first_byte() as usize;
        let lower = if first == 0 {
            0
        } else {
            fanout[first - 1] as usize
        };
        let upper = fanout[first] as usize;

        shas[lower..upper]
            .binary_search(sha)
            .ok()
            .map(|pos| lower + pos)
    }

    fn entry_unchecked(&self, pos: usize) -> PackIndexEntry {
        match self {
            Self::V1(idx) => PackIndexEntry {
                offset: u64::from(idx.offsets[pos]),
                sha: idx.shas[pos],
                crc32: Crc32::default(),
            },
            Self::V2(idx) => PackIndexEntry {
                offset: idx.offset_at(pos),
                sha: idx.shas[pos],
                crc32: idx.crcs[pos],
            },
        }
    }
}

/// The original pack index format: a fanout table followed by interleaved
/// offset/checksum records. No per-entry CRC-32s.
#[derive(Clone, Debug)]
pub struct PackIndexV1 {
    fanout: [u32; 256],
    offsets: Vec<u32>,
    shas: Vec<Sha1>,
    packfile_sha1: Sha1,
}

impl PackIndexV1 {
    fn decode(data: &[u8]) -> Result<Self, PackIndexError> {
        if data.len() < FANOUT_SIZE + TRAILER_SIZE {
            return Err(PackIndexError::invalid("file too small"));
        }

        let fanout = decode_fanout(&data[..FANOUT_SIZE])?;
        let count = fanout[255] as usize;

        let expected_len = FANOUT_SIZE + count * (4 + Sha1::LEN) + TRAILER_SIZE;
        if data.len() != expected_len {
            return Err(PackIndexError::invalid(
                "file length disagrees with fanout count",
            ));
        }

        let mut offsets = Vec::with_capacity(count);
        let mut shas = Vec::with_capacity(count);
        let mut pos = FANOUT_SIZE;
        for _ in 0..count {
            offsets.push(read_u32(data, pos));
            shas.push(Sha1::from_bytes(&data[pos + 4..pos + 4 + Sha1::LEN]));
            pos += 4 + Sha1::LEN;
        }

        Ok(Self {
            fanout,
            offsets,
            shas,
            packfile_sha1: Sha1::from_bytes(&data[pos..pos + Sha1::LEN]),
        })
    }
}

/// The improved pack index format: parallel checksum, CRC-32, and offset
/// tables, with 64-bit offset indirection for packs over 2 GiB.
#[derive(Clone, Debug)]
pub struct PackIndexV2 {
    fanout: [u32; 256],
    shas: Vec<Sha1>,
    crcs: Vec<Crc32>,
    offsets: Vec<u32>,
    higher_offsets: Vec<u64>,
    packfile_sha1: Sha1,
}

impl PackIndexV2 {
    fn decode(data: &[u8]) -> Result<Self, PackIndexError> {
        let header_size = 8 + FANOUT_SIZE;
        if data.len() < header_size + TRAILER_SIZE {
            return Err(PackIndexError::invalid("file too small"));
        }

        debug_assert!(data[..4] == V2_MAGIC, "caller sniffs the magic");
        let version = read_u32(data, 4);
        if version != 2 {
            return Err(PackIndexError::UnsupportedPackIndexVersion { version });
        }

        let fanout = decode_fanout(&data[8..header_size])?;
        let count = fanout[255] as usize;

        // sha table + crc table + offset table, before the higher offsets.
        let tables_len = count * (Sha1::LEN + 4 + 4);
        let fixed_len = header_size + tables_len + TRAILER_SIZE;
        if data.len() < fixed_len {
            return Err(PackIndexError::invalid(
                "file length disagrees with fanout count",
            ));
        }
        let higher_len = data.len() - fixed_len;
        if higher_len % 8 != 0 {
            return Err(PackIndexError::invalid(
                "higher-offset table is not a multiple of 8 bytes",
            ));
        }
        let higher_count = higher_len / 8;

        let mut pos = header_size;
        let mut shas = Vec::with_capacity(count);
        for _ in 0..count {
            shas.push(Sha1::from_bytes(&data[pos..pos + Sha1::LEN]));
            pos += Sha1::LEN;
        }

        let mut crcs = Vec::with_capacity(count);
        for _ in 0..count {
            crcs.push(Crc32::from_bytes(&data[pos..pos + 4]));
            pos += 4;
        }

        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push(read_u32(data, pos));
            pos += 4;
        }

        let mut higher_offsets = Vec::with_capacity(higher_count);
        for _ in 0..higher_count {
            higher_offsets.push(read_u64(data, pos));
            pos += 8;
        }

        // Resolve indirections eagerly so lookups cannot fail later.
        for &offset in &offsets {
            if offset & HIGHER_OFFSET_FLAG != 0 {
                let idx = (offset & !HIGHER_OFFSET_FLAG) as usize;
                if idx >= higher_offsets.len() {
                    return Err(PackIndexError::invalid(
                        "higher-offset index out of range",
                    ));
                }
            }
        }

        Ok(Self {
            fanout,
            shas,
            crcs,
            offsets,
            higher_offsets,
            packfile_sha1: Sha1::from_bytes(&data[pos..pos + Sha1::LEN]),
        })
    }

    /// Resolves the pack offset at a position, following the higher-offset
    /// indirection when the flag bit is set.
    fn offset_at(&self, pos: usize) -> u64 {
        let raw = self.offsets[pos];
        if raw & HIGHER_OFFSET_FLAG != 0 {
            // Bounds were validated during decode.
            self.higher_offsets[(raw & !HIGHER_OFFSET_FLAG) as usize]
        } else {
            u64::from(raw)
        }
    }
}

/// Parses and validates a fanout table.
///
/// The table must be non-decreasing; `fanout[255]` is the object count.
fn decode_fanout(data: &[u8]) -> Result<[u32; 256], PackIndexError> {
    debug_assert!(data.len() == FANOUT_SIZE);

    let mut fanout = [0u32; 256];
    let mut prev = 0u32;
    for (i, out) in fanout.iter_mut().enumerate() {
        let value = read_u32(data, i * 4);
        if value < prev {
            return Err(PackIndexError::invalid("fanout is not monotonic"));
        }
        prev = value;
        *out = value;
    }
    Ok(fanout)
}

/// Verifies the trailing self checksum over all preceding bytes.
fn verify_self_checksum(data: &[u8]) -> Result<(), PackIndexError> {
    if data.len() < TRAILER_SIZE {
        return Err(PackIndexError::invalid("file too small"));
    }

    let body_end = data.len() - Sha1::LEN;
    let expected = Sha1::from_bytes(&data[body_end..]);
    let actual = Sha1::from_bytes(&Sha1Hasher::digest(&data[..body_end]));
    if expected != actual {
        return Err(PackIndexError::PackIndexChecksumMismatch { expected, actual });
    }
    Ok(())
}

#[inline]
fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

#[inline]
fn read_u64(data: &[u8], pos: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[pos..pos + 8]);
    u64::from_be_bytes(bytes)
}
