//! Commit objects.
//!
//! # Commit Payload Format
//! ```text
//! tree <hex-checksum>\n
//! parent <hex-checksum>\n   (zero or more, order preserved)
//! author <name> <email> <secs> ±HHMM\n
//! committer <name> <email> <secs> ±HHMM\n
//! \n
//! <message>\n
//! ```
//!
//! Parents are an ordered multi-occurrence field; two commits are equal
//! only if their parents match in the same order.

use std::cell::OnceCell;

use crate::errors::ObjectError;
use crate::fields::{encode_block, parse_block, Singleton};
use crate::object_id::Sha1;
use crate::person::PersonTime;

/// A commit: a tree, its parents, the author and committer stamps, and a
/// message.
#[derive(Clone, Debug)]
pub struct Commit {
    tree: Sha1,
    parents: Vec<Sha1>,
    author: PersonTime,
    committer: PersonTime,
    message: String,
    payload: OnceCell<Vec<u8>>,
}

impl Commit {
    /// Creates a commit.
    #[must_use]
    pub fn new(
        tree: Sha1,
        parents: Vec<Sha1>,
        author: PersonTime,
        committer: PersonTime,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            author,
            committer,
            message: message.into(),
            payload: OnceCell::new(),
        }
    }

    /// Returns the checksum of the tree this commit points at.
    #[must_use]
    pub fn tree(&self) -> Sha1 {
        self.tree
    }

    /// Returns the parent checksums in order.
    #[must_use]
    pub fn parents(&self) -> &[Sha1] {
        &self.parents
    }

    /// Returns the author stamp.
    #[must_use]
    pub fn author(&self) -> &PersonTime {
        &self.author
    }

    /// Returns the committer stamp.
    #[must_use]
    pub fn committer(&self) -> &PersonTime {
        &self.committer
    }

    /// Returns the commit message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the canonical payload size.
    ///
    /// Computed by serializing once; the bytes are cached.
    #[must_use]
    pub fn size(&self) -> usize {
        self.payload_bytes().len()
    }

    fn payload_bytes(&self) -> &[u8] {
        self.payload.get_or_init(|| {
            let mut fields = vec![("tree", self.tree.to_string())];
            for parent in &self.parents {
                fields.push(("parent", parent.to_string()));
            }
            fields.push(("author", self.author.to_string()));
            fields.push(("committer", self.committer.to_string()));

            let mut out = Vec::new();
            encode_block(&fields, &self.message, &mut out);
            out
        })
    }

    /// Appends the canonical payload to `out`.
    pub fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.payload_bytes());
    }

    /// Decodes a commit payload.
    ///
    /// # Errors
    /// - `MalformedField` for a missing blank line, a missing or duplicate
    ///   singleton field, or a shapeless field line.
    /// - `MalformedSha1` / `MalformedPerson` for bad field values.
    /// - `UnrecognizedField` for any field name outside the commit
    ///   vocabulary.
    pub fn decode(payload: &[u8]) -> Result<Self, ObjectError> {
        let block = parse_block(payload)?;

        let mut tree = Singleton::new("duplicate tree field", "missing tree field");
        let mut author = Singleton::new("duplicate author field", "missing author field");
        let mut committer =
            Singleton::new("duplicate committer field", "missing committer field");
        let mut parents = Vec::new();

        for field in &block.fields {
            match field.name {
                "tree" => tree.set(Sha1::from_hex(field.value)?)?,
                "parent" => parents.push(Sha1::from_hex(field.value)?),
                "author" => author.set(PersonTime::parse(field.value)?)?,
                "committer" => committer.set(PersonTime::parse(field.value)?)?,
                name => {
                    return Err(ObjectError::UnrecognizedField {
                        name: name.to_string(),
                    })
                }
            }
        }

        Ok(Self::new(
            tree.take()?,
            parents,
            author.take()?,
            committer.take()?,
            block.message,
        ))
    }
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
            && self.parents == other.parents
            && self.author == other.author
            && self.committer == other.committer
            && self.message == other.message
    }
}

impl Eq for Commit {}
