//! Packfile reading.
//!
//! A pack is a concatenation of many objects with zlib-compressed payloads
//! and variable-length entry headers, addressed through a companion pack
//! index. This reader performs random access only: every read starts from
//! an offset the index supplied. There is no sequential-scan mode.
//!
//! # Pack Format
//! ```text
//! +--------------------+
//! | "PACK" (4B)        |
//! | Version (4B BE)    |  recorded, not validated
//! | Object count (4B)  |
//! +--------------------+
//! | Entries            |  header + zlib payload each
//! +--------------------+
//! | Pack SHA-1 (20B)   |
//! +--------------------+
//! ```
//!
//! An entry header's first byte packs `[more:1, type:3, size0:4]`; when
//! `more` is set, a variable-length extension supplies the remaining size
//! bits and the final payload size is `(extension << 4) | size0`. Types 6
//! (ofs-delta) and 7 (ref-delta) are recognized but their reconstruction is
//! unsupported; decoding one fails with `UnsupportedDelta`.
//!
//! # Integrity
//! While an entry's payload inflates, a CRC-32 accumulator covers the raw
//! entry bytes (the header and the compressed payload) and the result is
//! checked against the CRC the pack index recorded (v2 indices only; v1
//! carries none). The pack's own trailing SHA-1 is excluded from the data
//! region so corrupt offsets cannot misparse it as an entry, but it is not
//! re-hashed here.
//!
//! # Resource Ownership
//! A `Pack` owns one memory mapping of its pack file from `open` until
//! drop, released on all exit paths. The companion index file is read once
//! at open time and its handle closed; only the parsed form is retained.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use flate2::{Crc, Decompress, FlushDecompress, Status};
use memmap2::Mmap;
use tracing::debug;

use crate::errors::ObjectError;
use crate::object::Object;
use crate::object_id::{Crc32, Sha1};
use crate::pack_index::{PackIndex, PackIndexError};
use crate::varint;

/// Pack header size: magic(4) + version(4) + object count(4).
const HEADER_SIZE: usize = 12;

/// Inflate scratch buffer size.
const INFLATE_BUF_SIZE: usize = 32 * 1024;

/// Errors from packfile reading.
#[derive(Debug)]
#[non_exhaustive]
pub enum PackError {
    /// I/O error opening or mapping the pack.
    Io(io::Error),
    /// The pack header or an entry header is malformed.
    InvalidPackHeader { detail: &'static str },
    /// An entry's compressed data is corrupt or truncated.
    Corrupt { detail: &'static str },
    /// A delta entry was encountered; reconstruction is unsupported.
    UnsupportedDelta { kind: DeltaKind },
    /// An entry's CRC-32 disagrees with the pack index.
    PackChecksumMismatch {
        sha: Sha1,
        expected: Crc32,
        actual: Crc32,
    },
    /// The companion pack index failed to load.
    Index(PackIndexError),
    /// The inflated payload is not a valid object of the declared type.
    Object(ObjectError),
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::InvalidPackHeader { detail } => write!(f, "invalid pack: {detail}"),
            Self::Corrupt { detail } => write!(f, "corrupt pack entry: {detail}"),
            Self::UnsupportedDelta { kind } => {
                write!(f, "{kind} entries are not supported")
            }
            Self::PackChecksumMismatch {
                sha,
                expected,
                actual,
            } => write!(
                f,
                "entry {sha} CRC-32 is {actual}, pack index recorded {expected}"
            ),
            Self::Index(err) => write!(f, "{err}"),
            Self::Object(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Index(err) => Some(err),
            Self::Object(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PackError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<PackIndexError> for PackError {
    fn from(err: PackIndexError) -> Self {
        Self::Index(err)
    }
}

impl From<ObjectError> for PackError {
    fn from(err: ObjectError) -> Self {
        Self::Object(err)
    }
}

/// The two delta entry kinds this reader recognizes but does not apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaKind {
    /// Base addressed by a backward offset in the same pack.
    Ofs,
    /// Base addressed by checksum.
    Ref,
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ofs => write!(f, "ofs-delta"),
            Self::Ref => write!(f, "ref-delta"),
        }
    }
}

/// Parsed pack entry kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackEntryKind {
    Commit,
    Tree,
    Blob,
    Tag,
    /// Delta against an entry `base_offset` bytes back in the same pack.
    OfsDelta { base_offset: u64 },
    /// Delta against the object with this checksum.
    RefDelta { base: Sha1 },
}

impl PackEntryKind {
    /// Returns the envelope type name for a base entry kind.
    fn type_name(self) -> Option<&'static str> {
        match self {
            Self::Commit => Some("commit"),
            Self::Tree => Some("tree"),
            Self::Blob => Some("blob"),
            Self::Tag => Some("tag"),
            Self::OfsDelta { .. } | Self::RefDelta { .. } => None,
        }
    }
}

/// A parsed entry header.
///
/// `data_start` is the pack-relative offset where the zlib stream begins;
/// for delta entries it points past the base reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackEntryHeader {
    /// Uncompressed payload size declared by the header.
    pub size: u64,
    /// Pack-relative offset of the zlib stream.
    pub data_start: usize,
    /// Entry kind.
    pub kind: PackEntryKind,
}

/// An open pack: the mapped pack file plus its parsed companion index.
pub struct Pack {
    pack_path: PathBuf,
    map: Mmap,
    data_end: usize,
    version: u32,
    object_count: u32,
    index: PackIndex,
}

impl Pack {
    /// Opens the pack at `path`, which may name either the `.pack` file or
    /// its `.idx` companion; the sibling is derived by extension swap.
    ///
    /// The pack header is validated and the companion index fully decoded
    /// and verified before this returns. The index file handle is closed
    /// here; the pack mapping lives until the `Pack` drops.
    ///
    /// # Errors
    /// - `PackError::Io` if either file cannot be opened or mapped.
    /// - `PackError::InvalidPackHeader` for a bad magic.
    /// - `PackError::Index` if the companion index is missing or corrupt.
    pub fn open(path: &Path) -> Result<Self, PackError> {
        let pack_path = path.with_extension("pack");
        let idx_path = path.with_extension("idx");

        let file = File::open(&pack_path)?;
        // Safety: the mapping is read-only and the store is append-only by
        // content addressing; no live pack is rewritten in place.
        let map = unsafe { Mmap::map(&file)? };
        drop(file);

        let min_size = HEADER_SIZE + Sha1::LEN;
        if map.len() < min_size {
            return Err(PackError::InvalidPackHeader {
                detail: "file too small",
            });
        }
        if &map[..4] != b"PACK" {
            return Err(PackError::InvalidPackHeader {
                detail: "bad signature",
            });
        }
        // Only the signature gates the open; the version is recorded as
        // read.
        let version = u32::from_be_bytes([map[4], map[5], map[6], map[7]]);
        let object_count = u32::from_be_bytes([map[8], map[9], map[10], map[11]]);

        let index = PackIndex::from_path(&idx_path)?;
        let data_end = map.len() - Sha1::LEN;

        debug!(
            pack = %pack_path.display(),
            version,
            objects = object_count,
            index_version = index.version(),
            "opened pack"
        );

        Ok(Self {
            pack_path,
            map,
            data_end,
            version,
            object_count,
            index,
        })
    }

    /// Returns the pack file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.pack_path
    }

    /// Returns the pack format version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the object count declared by the pack header.
    #[must_use]
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Returns the companion index.
    #[must_use]
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Returns the sorted checksums of the objects in this pack.
    #[must_use]
    pub fn objects(&self) -> &[Sha1] {
        self.index.objects()
    }

    /// Looks an object up by checksum and decodes it.
    ///
    /// Returns `Ok(None)` when the object is not in this pack.
    ///
    /// # Errors
    /// - `PackError::UnsupportedDelta` for delta entries.
    /// - `PackError::PackChecksumMismatch` when the entry's CRC-32
    ///   disagrees with a v2 index.
    /// - `PackError::Corrupt` / `PackError::Object` for bad entry data.
    pub fn object_by_sha1(&self, sha: &Sha1) -> Result<Option<Object>, PackError> {
        let Some(entry) = self.index.lookup(sha) else {
            return Ok(None);
        };

        let (object, actual_crc) = self.decode_entry(entry.offset)?;

        // Version 1 indices record no CRCs; the empty value skips the check.
        if !entry.crc32.is_empty() && entry.crc32 != actual_crc {
            return Err(PackError::PackChecksumMismatch {
                sha: *sha,
                expected: entry.crc32,
                actual: actual_crc,
            });
        }

        Ok(Some(object))
    }

    /// Parses the entry header at a pack-relative offset.
    ///
    /// # Errors
    /// Returns `InvalidPackHeader` for offsets outside the data region,
    /// truncated headers, size overflows, or unknown type codes.
    pub fn entry_header_at(&self, offset: u64) -> Result<PackEntryHeader, PackError> {
        let pos = usize::try_from(offset).map_err(|_| PackError::InvalidPackHeader {
            detail: "entry offset out of range",
        })?;
        if pos < HEADER_SIZE || pos >= self.data_end {
            return Err(PackError::InvalidPackHeader {
                detail: "entry offset out of range",
            });
        }

        let data = &self.map[..self.data_end];
        let first = data[pos];
        let type_code = (first >> 4) & 0x07;
        let size0 = u64::from(first & 0x0f);
        let mut next = pos + 1;

        // The high bit of the first byte pulls a variable-length extension
        // carrying the remaining size bits.
        let size = if first & 0x80 != 0 {
            let (extension, consumed) =
                varint::decode(&data[next..]).map_err(|_| PackError::InvalidPackHeader {
                    detail: "entry size extension is malformed",
                })?;
            next += consumed;
            extension
                .checked_shl(4)
                .filter(|shifted| shifted >> 4 == extension)
                .ok_or(PackError::InvalidPackHeader {
                    detail: "entry size overflows 64 bits",
                })?
                | size0
        } else {
            size0
        };

        let kind = match type_code {
            1 => PackEntryKind::Commit,
            2 => PackEntryKind::Tree,
            3 => PackEntryKind::Blob,
            4 => PackEntryKind::Tag,
            6 => {
                let (base_offset, consumed) = parse_ofs_base(data, next, offset)?;
                next += consumed;
                PackEntryKind::OfsDelta { base_offset }
            }
            7 => {
                let end = next + Sha1::LEN;
                if end > self.data_end {
                    return Err(PackError::InvalidPackHeader {
                        detail: "ref-delta base checksum is truncated",
                    });
                }
                let base = Sha1::from_bytes(&data[next..end]);
                next = end;
                PackEntryKind::RefDelta { base }
            }
            _ => {
                return Err(PackError::InvalidPackHeader {
                    detail: "unknown entry type code",
                })
            }
        };

        Ok(PackEntryHeader {
            size,
            data_start: next,
            kind,
        })
    }

    /// Decodes the entry at a pack-relative offset into an object, also
    /// returning the CRC-32 over the raw entry bytes.
    fn decode_entry(&self, offset: u64) -> Result<(Object, Crc32), PackError> {
        let header = self.entry_header_at(offset)?;

        let type_name = match header.kind {
            PackEntryKind::OfsDelta { .. } => {
                return Err(PackError::UnsupportedDelta {
                    kind: DeltaKind::Ofs,
                })
            }
            PackEntryKind::RefDelta { .. } => {
                return Err(PackError::UnsupportedDelta {
                    kind: DeltaKind::Ref,
                })
            }
            kind => kind.type_name().expect("base kinds have a type name"),
        };

        let size = usize::try_from(header.size).map_err(|_| PackError::Corrupt {
            detail: "entry size exceeds addressable memory",
        })?;

        let compressed = &self.map[header.data_start..self.data_end];
        let (payload, consumed) = inflate_exact(compressed, size)?;

        // The recorded CRC-32 spans the whole raw entry: the header bytes
        // and the compressed payload, not the inflated form.
        let entry_start = usize::try_from(offset).expect("validated by entry_header_at");
        let mut crc = Crc::new();
        crc.update(&self.map[entry_start..header.data_start]);
        crc.update(&compressed[..consumed]);

        let object = Object::decode_payload(type_name, &payload)?;
        Ok((object, Crc32::from_u32(crc.sum())))
    }
}

impl fmt::Debug for Pack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pack")
            .field("path", &self.pack_path)
            .field("version", &self.version)
            .field("object_count", &self.object_count)
            .finish_non_exhaustive()
    }
}

/// Parses the OFS_DELTA negative-offset encoding at `pos`.
///
/// Returns the absolute base offset and the bytes consumed. The encoding
/// is a big-endian base-128 number with a continuation bit, biased so
/// each continuation adds one.
fn parse_ofs_base(data: &[u8], pos: usize, delta_offset: u64) -> Result<(u64, usize), PackError> {
    let truncated = PackError::InvalidPackHeader {
        detail: "ofs-delta base offset is truncated",
    };

    let mut consumed = 0usize;
    let mut byte = *data.get(pos).ok_or(truncated)?;
    consumed += 1;
    let mut value = u64::from(byte & 0x7f);

    while byte & 0x80 != 0 {
        if consumed >= 10 {
            return Err(PackError::InvalidPackHeader {
                detail: "ofs-delta base offset is too long",
            });
        }
        byte = *data.get(pos + consumed).ok_or(PackError::InvalidPackHeader {
            detail: "ofs-delta base offset is truncated",
        })?;
        consumed += 1;
        value = ((value + 1) << 7) | u64::from(byte & 0x7f);
    }

    if value >= delta_offset {
        return Err(PackError::InvalidPackHeader {
            detail: "ofs-delta base offset underflows the pack",
        });
    }
    Ok((delta_offset - value, consumed))
}

/// Inflates a zlib stream expecting exactly `expected` output bytes.
///
/// Returns the inflated bytes and the number of compressed input bytes
/// consumed, so the caller can bound the CRC-32 over the raw entry.
fn inflate_exact(input: &[u8], expected: usize) -> Result<(Vec<u8>, usize), PackError> {
    let mut decompress = Decompress::new(true);
    let mut out = Vec::with_capacity(expected);
    let mut buf = [0u8; INFLATE_BUF_SIZE];
    let mut in_pos = 0usize;

    loop {
        let before_in = decompress.total_in() as usize;
        let before_out = decompress.total_out() as usize;

        let status = decompress
            .decompress(&input[in_pos..], &mut buf, FlushDecompress::None)
            .map_err(|_| PackError::Corrupt {
                detail: "zlib stream is invalid",
            })?;

        let consumed = decompress.total_in() as usize - before_in;
        let produced = decompress.total_out() as usize - before_out;
        in_pos += consumed;

        if produced != 0 {
            if out.len() + produced > expected {
                return Err(PackError::Corrupt {
                    detail: "entry inflates past its declared size",
                });
            }
            out.extend_from_slice(&buf[..produced]);
        }

        match status {
            Status::StreamEnd => {
                if out.len() != expected {
                    return Err(PackError::Corrupt {
                        detail: "entry inflates short of its declared size",
                    });
                }
                return Ok((out, in_pos));
            }
            Status::Ok | Status::BufError => {
                if consumed == 0 && produced == 0 {
                    return Err(PackError::Corrupt {
                        detail: if in_pos >= input.len() {
                            "entry data is truncated"
                        } else {
                            "zlib stream stalled"
                        },
                    });
                }
            }
        }
    }
}
