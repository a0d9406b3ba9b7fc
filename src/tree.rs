//! Tree objects and tree entries.
//!
//! # Tree Payload Format
//!
//! A tree payload is a concatenation of entries with no separator, each:
//! ```text
//! <octal-mode> SP <name> NUL <20-byte checksum>
//! ```
//! The mode is non-padded octal (`40000` for directories, `100644` for
//! regular files). The name runs to the NUL byte and the raw checksum
//! follows immediately.
//!
//! # Sort Invariant
//!
//! Entries are sorted ascending lexicographically by name. Construction
//! and decoding both re-sort, so the invariant holds no matter how the
//! entries arrived; serializing an unsorted tree would change its SHA-1.

use memchr::memchr;

use crate::errors::ObjectError;
use crate::mode::{parse_octal, GitMode};
use crate::object::Object;
use crate::object_id::Sha1;
use crate::stream::Stream;

/// An item in a tree, pointing at a blob or another tree by checksum.
///
/// A tree entry is not itself an object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    mode: GitMode,
    name: String,
    sha: Sha1,
}

impl TreeEntry {
    /// Creates a tree entry.
    ///
    /// # Errors
    /// Returns `MalformedField` if the name is empty, contains a NUL byte,
    /// or contains a slash.
    pub fn new(mode: GitMode, name: impl Into<String>, sha: Sha1) -> Result<Self, ObjectError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ObjectError::field("tree entry name is empty"));
        }
        if name.as_bytes().contains(&0) {
            return Err(ObjectError::field("tree entry name contains NUL"));
        }
        if name.contains('/') {
            return Err(ObjectError::field("tree entry name contains a slash"));
        }
        Ok(Self { mode, name, sha })
    }

    /// Builds an entry pointing at an existing blob or tree object.
    ///
    /// Only the checksum can be inferred from the object, so the caller
    /// supplies the intended mode and name.
    ///
    /// # Errors
    /// Returns `MalformedField` for object types other than blob and tree,
    /// or for an invalid name.
    pub fn from_object(
        object: &Object,
        mode: GitMode,
        name: impl Into<String>,
    ) -> Result<Self, ObjectError> {
        match object {
            Object::Blob(_) | Object::Tree(_) => {}
            _ => {
                return Err(ObjectError::field(
                    "only blobs and trees can back a tree entry",
                ))
            }
        }
        let sha = Stream::new(object.clone()).hash();
        Self::new(mode, name, sha)
    }

    /// Returns the entry's mode.
    #[must_use]
    pub fn mode(&self) -> GitMode {
        self.mode
    }

    /// Returns the entry's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the checksum of the object the entry points at.
    #[must_use]
    pub fn sha(&self) -> Sha1 {
        self.sha
    }

    /// Appends the canonical serialization to `out`.
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.mode.octal().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.name.as_bytes());
        out.push(0);
        out.extend_from_slice(self.sha.as_bytes());
    }

    /// Serialized length in bytes.
    fn encoded_len(&self) -> usize {
        self.mode.octal().len() + 1 + self.name.len() + 1 + Sha1::LEN
    }
}

/// A tree object: a sorted list of entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Creates a tree from entries, sorting them by name.
    #[must_use]
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        sort_entries(&mut entries);
        Self { entries }
    }

    /// Returns the sorted entries.
    #[must_use]
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Returns the canonical payload size.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.iter().map(TreeEntry::encoded_len).sum()
    }

    /// Decodes a tree payload, re-sorting the entries.
    ///
    /// # Errors
    /// Returns `MalformedMode` for bad mode digits, `MalformedSha1` for a
    /// truncated checksum, and `MalformedField` for name violations or a
    /// payload that ends mid-entry.
    pub fn decode(payload: &[u8]) -> Result<Self, ObjectError> {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < payload.len() {
            let rest = &payload[pos..];

            let space = memchr(b' ', rest)
                .ok_or(ObjectError::field("tree entry ends before mode"))?;
            let mode = parse_octal(&rest[..space])
                .map(GitMode::new)
                .ok_or(ObjectError::MalformedMode {
                    detail: "tree entry mode is not a valid octal number",
                })?;

            let after_mode = &rest[space + 1..];
            let nul = memchr(0, after_mode)
                .ok_or(ObjectError::field("tree entry name is not terminated"))?;
            let name = std::str::from_utf8(&after_mode[..nul])
                .map_err(|_| ObjectError::field("tree entry name is not UTF-8"))?;

            let after_name = &after_mode[nul + 1..];
            if after_name.len() < Sha1::LEN {
                return Err(ObjectError::MalformedSha1 {
                    detail: "tree entry checksum is truncated",
                });
            }
            let sha = Sha1::from_bytes(&after_name[..Sha1::LEN]);

            entries.push(TreeEntry::new(mode, name, sha)?);
            pos += space + 1 + nul + 1 + Sha1::LEN;
        }

        Ok(Self::new(entries))
    }

    /// Appends the canonical payload to `out`: each sorted entry in turn,
    /// no separators.
    pub fn encode_payload(&self, out: &mut Vec<u8>) {
        for entry in &self.entries {
            entry.encode_into(out);
        }
    }
}

fn sort_entries(entries: &mut [TreeEntry]) {
    entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha(hex: &str) -> Sha1 {
        Sha1::from_hex(hex).unwrap()
    }

    fn file_entry(name: &str, hex: &str) -> TreeEntry {
        TreeEntry::new(
            GitMode::REGULAR | GitMode::PERM_READ_WRITE,
            name,
            sha(hex),
        )
        .unwrap()
    }

    const BLOB1_SHA: &str = "bd9dbf5aae1a3862dd1526723246b20206e5fc37";
    const BLOB2_SHA: &str = "7400f1589a11d1b912d6a90574d4f836087599b1";

    fn two_entry_payload() -> Vec<u8> {
        let mut expected = Vec::new();
        expected.extend_from_slice(b"100644 blob1\x00");
        expected.extend_from_slice(sha(BLOB1_SHA).as_bytes());
        expected.extend_from_slice(b"100644 blob2\x00");
        expected.extend_from_slice(sha(BLOB2_SHA).as_bytes());
        expected
    }

    #[test]
    fn construction_sorts_entries() {
        // blob2 first; the constructor must order blob1 before it.
        let tree = Tree::new(vec![
            file_entry("blob2", BLOB2_SHA),
            file_entry("blob1", BLOB1_SHA),
        ]);

        let names: Vec<_> = tree.entries().iter().map(TreeEntry::name).collect();
        assert_eq!(names, ["blob1", "blob2"]);
    }

    #[test]
    fn payload_matches_known_form() {
        let tree = Tree::new(vec![
            file_entry("blob2", BLOB2_SHA),
            file_entry("blob1", BLOB1_SHA),
        ]);

        let mut out = Vec::new();
        tree.encode_payload(&mut out);
        assert_eq!(out, two_entry_payload());
        assert_eq!(tree.size(), 66);
    }

    #[test]
    fn decode_round_trips() {
        let tree = Tree::new(vec![
            file_entry("blob1", BLOB1_SHA),
            file_entry("blob2", BLOB2_SHA),
        ]);
        let mut out = Vec::new();
        tree.encode_payload(&mut out);

        assert_eq!(Tree::decode(&out).unwrap(), tree);
    }

    #[test]
    fn decode_resorts_shuffled_input() {
        // Hand-build a payload with blob2 before blob1.
        let mut shuffled = Vec::new();
        shuffled.extend_from_slice(b"100644 blob2\x00");
        shuffled.extend_from_slice(sha(BLOB2_SHA).as_bytes());
        shuffled.extend_from_slice(b"100644 blob1\x00");
        shuffled.extend_from_slice(sha(BLOB1_SHA).as_bytes());

        let tree = Tree::decode(&shuffled).unwrap();
        let names: Vec<_> = tree.entries().iter().map(TreeEntry::name).collect();
        assert_eq!(names, ["blob1", "blob2"]);

        let mut out = Vec::new();
        tree.encode_payload(&mut out);
        assert_eq!(out, two_entry_payload());
    }

    #[test]
    fn directories_serialize_without_padding() {
        let entry = TreeEntry::new(GitMode::DIR, "src", sha(BLOB1_SHA)).unwrap();
        let mut out = Vec::new();
        entry.encode_into(&mut out);
        assert!(out.starts_with(b"40000 src\x00"));
    }

    #[test]
    fn decode_empty_payload() {
        let tree = Tree::decode(b"").unwrap();
        assert!(tree.entries().is_empty());
        assert_eq!(tree.size(), 0);
    }

    #[test]
    fn rejects_bad_entries() {
        // Bad mode digits.
        let mut bad_mode = Vec::new();
        bad_mode.extend_from_slice(b"10a644 file\x00");
        bad_mode.extend_from_slice(&[0x11; 20]);
        assert!(matches!(
            Tree::decode(&bad_mode).unwrap_err(),
            ObjectError::MalformedMode { .. }
        ));

        // Truncated checksum.
        let mut short_sha = Vec::new();
        short_sha.extend_from_slice(b"100644 file\x00");
        short_sha.extend_from_slice(&[0x11; 10]);
        assert!(matches!(
            Tree::decode(&short_sha).unwrap_err(),
            ObjectError::MalformedSha1 { .. }
        ));

        // Missing NUL terminator.
        assert!(Tree::decode(b"100644 file-without-nul").is_err());
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(TreeEntry::new(GitMode::DIR, "", sha(BLOB1_SHA)).is_err());
        assert!(TreeEntry::new(GitMode::DIR, "a/b", sha(BLOB1_SHA)).is_err());
        assert!(TreeEntry::new(GitMode::DIR, "a\0b", sha(BLOB1_SHA)).is_err());
    }
}
