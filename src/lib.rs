//! Read-oriented access to Git's on-disk object database.
//!
//! This crate understands Git's persistent storage formats: object
//! serialization and SHA-1 addressing, per-object zlib-compressed loose
//! files, the packfile and pack-index random-access path, the staging
//! index, and refs.
//!
//! Lookup flow:
//! 1. A checksum or ref name is presented to the [`Repository`] facade.
//! 2. Objects resolve loose-first, then through each pack via its
//!    companion index; refs resolve loose-first, then through
//!    `packed-refs`.
//! 3. A pack-index hit yields a byte offset whose entry inflates into an
//!    [`Object`].
//!
//! Serialization flows the other way: an object's canonical payload is
//! framed with the `<type> <size>\0` envelope, hashed, and can be written
//! back as a loose object.
//!
//! # Invariants
//! - Objects are immutable after decode; streams cache their serialized
//!   form and checksum.
//! - Tree entries are always sorted by name before serialization.
//! - Checksummed formats (pack index, staging index) are verified at
//!   decode time, before any parsed data is returned.
//! - Delta pack entries are recognized but never reconstructed.

pub mod blob;
pub mod commit;
pub mod config;
pub mod errors;
pub(crate) mod fields;
pub mod globs;
pub mod index;
pub mod loose;
pub mod mode;
pub mod object;
pub mod object_id;
pub mod pack;
pub mod pack_index;
pub mod person;
pub mod refs;
pub mod repo;
pub mod stream;
pub mod tag;
pub mod tree;
pub mod varint;

pub use blob::Blob;
pub use commit::Commit;
pub use config::{Config, ConfigError, Section, Value};
pub use errors::ObjectError;
pub use globs::{GlobTable, GlobsError};
pub use index::{IndexEntry, IndexError, IndexExtension, IndexFile, IndexFlags, IndexV3Flags};
pub use loose::{LooseError, LooseStore};
pub use mode::GitMode;
pub use object::Object;
pub use object_id::{Crc32, Sha1};
pub use pack::{DeltaKind, Pack, PackEntryHeader, PackEntryKind, PackError};
pub use pack_index::{PackIndex, PackIndexEntry, PackIndexError};
pub use person::{Author, PersonTime};
pub use refs::{PackedRefs, Ref, RefError, Symref};
pub use repo::{RepoError, Repository};
pub use stream::Stream;
pub use tag::Tag;
pub use tree::{Tree, TreeEntry};
pub use varint::VarintError;
