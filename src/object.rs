//! The object sum type.
//!
//! Git's object database holds exactly four object kinds. Every kind has a
//! canonical payload serialization; the `stream` module frames a payload
//! with the `<type> <size>\0` envelope whose SHA-1 names the object.

use crate::blob::Blob;
use crate::commit::Commit;
use crate::errors::ObjectError;
use crate::tag::Tag;
use crate::tree::Tree;

/// One of the four Git object kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Returns the type name used in envelopes and pack entries.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Blob(_) => "blob",
            Self::Tree(_) => "tree",
            Self::Commit(_) => "commit",
            Self::Tag(_) => "tag",
        }
    }

    /// Returns the canonical payload size in bytes, excluding the envelope.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Blob(blob) => blob.size(),
            Self::Tree(tree) => tree.size(),
            Self::Commit(commit) => commit.size(),
            Self::Tag(tag) => tag.size(),
        }
    }

    /// Appends the canonical payload to `out`.
    pub fn encode_payload(&self, out: &mut Vec<u8>) {
        match self {
            Self::Blob(blob) => blob.encode_payload(out),
            Self::Tree(tree) => tree.encode_payload(out),
            Self::Commit(commit) => commit.encode_payload(out),
            Self::Tag(tag) => tag.encode_payload(out),
        }
    }

    /// Decodes a payload, dispatching on the type name from an envelope or
    /// pack entry header.
    ///
    /// # Errors
    /// - `UnknownObjectType` if `type_name` is not one of the four kinds.
    /// - The variant decoder's error otherwise.
    pub fn decode_payload(type_name: &str, payload: &[u8]) -> Result<Self, ObjectError> {
        match type_name {
            "blob" => Ok(Self::Blob(Blob::decode(payload))),
            "tree" => Ok(Self::Tree(Tree::decode(payload)?)),
            "commit" => Ok(Self::Commit(Commit::decode(payload)?)),
            "tag" => Ok(Self::Tag(Tag::decode(payload)?)),
            other => Err(ObjectError::UnknownObjectType {
                found: other.to_string(),
            }),
        }
    }
}

impl From<Blob> for Object {
    fn from(blob: Blob) -> Self {
        Self::Blob(blob)
    }
}

impl From<Tree> for Object {
    fn from(tree: Tree) -> Self {
        Self::Tree(tree)
    }
}

impl From<Commit> for Object {
    fn from(commit: Commit) -> Self {
        Self::Commit(commit)
    }
}

impl From<Tag> for Object {
    fn from(tag: Tag) -> Self {
        Self::Tag(tag)
    }
}
