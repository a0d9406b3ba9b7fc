//! The stream envelope.
//!
//! Every object is stored and hashed in its framed form:
//! ```text
//! <type> <decimal-size>\0<payload>
//! ```
//! where `<size>` is the ASCII decimal length of the payload in bytes. The
//! SHA-1 of an object is defined as the SHA-1 of this framed form. Loose
//! object files hold the zlib-compressed envelope; pack entries store the
//! payload with the type and size moved into the entry header.

use std::cell::OnceCell;

use memchr::memchr;
use sha1::{Digest, Sha1 as Sha1Hasher};

use crate::errors::ObjectError;
use crate::object::Object;
use crate::object_id::Sha1;

/// An object together with its envelope form.
///
/// The serialized bytes and the checksum are computed once and cached;
/// a stream is immutable after construction.
#[derive(Clone, Debug)]
pub struct Stream {
    object: Object,
    bytes: OnceCell<Vec<u8>>,
    checksum: OnceCell<Sha1>,
}

impl Stream {
    /// Wraps an object.
    #[must_use]
    pub fn new(object: Object) -> Self {
        Self {
            object,
            bytes: OnceCell::new(),
            checksum: OnceCell::new(),
        }
    }

    /// Returns the wrapped object.
    #[must_use]
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// Unwraps the stream into its object.
    #[must_use]
    pub fn into_object(self) -> Object {
        self.object
    }

    /// Returns the envelope bytes, serializing on first call.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.bytes.get_or_init(|| {
            let object = &self.object;
            let mut out = Vec::with_capacity(object.size() + 16);
            out.extend_from_slice(object.type_name().as_bytes());
            out.push(b' ');
            out.extend_from_slice(object.size().to_string().as_bytes());
            out.push(0);
            object.encode_payload(&mut out);
            out
        })
    }

    /// Returns the SHA-1 of the envelope bytes, hashing on first call.
    #[must_use]
    pub fn hash(&self) -> Sha1 {
        *self.checksum.get_or_init(|| {
            let digest = Sha1Hasher::digest(self.bytes());
            Sha1::from_bytes(&digest)
        })
    }

    /// Decodes an envelope, reconstructing the object named in its header.
    ///
    /// # Errors
    /// - `MalformedField` if the header shape is wrong or the payload
    ///   length disagrees with the declared size.
    /// - `UnknownObjectType` for a type outside the four kinds.
    /// - The variant decoder's error for a bad payload.
    pub fn decode(data: &[u8]) -> Result<Self, ObjectError> {
        let space = memchr(b' ', data)
            .ok_or(ObjectError::field("envelope has no space after type"))?;
        let type_name = std::str::from_utf8(&data[..space])
            .map_err(|_| ObjectError::field("envelope type is not UTF-8"))?;

        let after_type = &data[space + 1..];
        let nul = memchr(0, after_type)
            .ok_or(ObjectError::field("envelope has no NUL after size"))?;
        let size_text = std::str::from_utf8(&after_type[..nul])
            .map_err(|_| ObjectError::field("envelope size is not UTF-8"))?;
        let size = size_text
            .parse::<usize>()
            .map_err(|_| ObjectError::field("envelope size is not a decimal number"))?;

        let payload = &after_type[nul + 1..];
        if payload.len() != size {
            return Err(ObjectError::field(
                "envelope size disagrees with payload length",
            ));
        }

        let object = Object::decode_payload(type_name, payload)?;
        Ok(Self::new(object))
    }
}

impl From<Object> for Stream {
    fn from(object: Object) -> Self {
        Self::new(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;
    use crate::commit::Commit;
    use crate::mode::GitMode;
    use crate::person::{Author, PersonTime};
    use crate::tag::Tag;
    use crate::tree::{Tree, TreeEntry};

    fn sha(hex: &str) -> Sha1 {
        Sha1::from_hex(hex).unwrap()
    }

    fn person(name: &str, email: &str, secs: i64, offset: i32) -> PersonTime {
        PersonTime::new(Author::new(name, email).unwrap(), secs, offset)
    }

    struct Fixture {
        stream: Stream,
        body: Vec<u8>,
        hash: &'static str,
    }

    /// The four known-hash fixtures: blob, tree, commit, annotated tag.
    fn fixtures() -> Vec<Fixture> {
        let blob1 = Blob::new(&b"what is up, doc?"[..]);
        let blob2 = Blob::new(&b"my hovercraft is full of eels"[..]);

        let blob1_fixture = Fixture {
            stream: Stream::new(blob1.into()),
            body: b"blob 16\x00what is up, doc?".to_vec(),
            hash: "bd9dbf5aae1a3862dd1526723246b20206e5fc37",
        };

        let blob2_fixture = Fixture {
            stream: Stream::new(blob2.into()),
            body: b"blob 29\x00my hovercraft is full of eels".to_vec(),
            hash: "7400f1589a11d1b912d6a90574d4f836087599b1",
        };

        let file = GitMode::REGULAR | GitMode::PERM_READ_WRITE;
        let tree = Tree::new(vec![
            TreeEntry::new(file, "blob2", sha("7400f1589a11d1b912d6a90574d4f836087599b1"))
                .unwrap(),
            TreeEntry::new(file, "blob1", sha("bd9dbf5aae1a3862dd1526723246b20206e5fc37"))
                .unwrap(),
        ]);
        let mut tree_body = b"tree 66\x00100644 blob1\x00".to_vec();
        tree_body.extend_from_slice(sha("bd9dbf5aae1a3862dd1526723246b20206e5fc37").as_bytes());
        tree_body.extend_from_slice(b"100644 blob2\x00");
        tree_body.extend_from_slice(sha("7400f1589a11d1b912d6a90574d4f836087599b1").as_bytes());
        let tree_fixture = Fixture {
            stream: Stream::new(tree.into()),
            body: tree_body,
            hash: "dd08687e90cca5ce563867c40346781e3b115d36",
        };

        let commit = Commit::new(
            sha("935e0a5c8361e59f8bbc01b2dbfbec3a44e24904"),
            vec![sha("775c7228621559623406857d1810a3153616336f")],
            person("Kosuke Asami", "tfortress58@gmail.com", 1395160458, 9 * 3600),
            person("Jack Nagel", "jacknagel@gmail.com", 1395293290, -5 * 3600),
            "byobu 5.75\n\nThis release includes fixes about prefix problem that is discussed\nin #27045.\n\nCloses #27667.\n\nSigned-off-by: Jack Nagel <jacknagel@gmail.com>",
        );
        let commit_fixture = Fixture {
            stream: Stream::new(commit.into()),
            body: format!(
                "commit 371\x00tree 935e0a5c8361e59f8bbc01b2dbfbec3a44e24904\n\
                 parent 775c7228621559623406857d1810a3153616336f\n\
                 author Kosuke Asami <tfortress58@gmail.com> 1395160458 +0900\n\
                 committer Jack Nagel <jacknagel@gmail.com> 1395293290 -0500\n\
                 \n\
                 byobu 5.75\n\nThis release includes fixes about prefix problem that is discussed\nin #27045.\n\nCloses #27667.\n\nSigned-off-by: Jack Nagel <jacknagel@gmail.com>\n"
            )
            .into_bytes(),
            hash: "91465a197c01a5f022a224a592e769147db145a2",
        };

        let tag = Tag::new(
            sha("6b6f8b566ef3245f5b25d03c61b2af0a1f55301e"),
            "commit",
            "v4.1.0.rc2",
            person(
                "David Heinemeier Hansson",
                "david@loudthinking.com",
                1395778247,
                3600,
            ),
            "v4.1.0.rc2 release",
        );
        let tag_fixture = Fixture {
            stream: Stream::new(tag.into()),
            body: b"tag 169\x00object 6b6f8b566ef3245f5b25d03c61b2af0a1f55301e\n\
                type commit\n\
                tag v4.1.0.rc2\n\
                tagger David Heinemeier Hansson <david@loudthinking.com> 1395778247 +0100\n\
                \n\
                v4.1.0.rc2 release\n"
                .to_vec(),
            hash: "d82b255a0f16a06ebd2a3fbfe4893719d697c043",
        };

        vec![
            blob1_fixture,
            blob2_fixture,
            tree_fixture,
            commit_fixture,
            tag_fixture,
        ]
    }

    #[test]
    fn envelope_bytes_match_fixtures() {
        for fixture in fixtures() {
            assert_eq!(
                fixture.stream.bytes(),
                fixture.body.as_slice(),
                "envelope mismatch for {}",
                fixture.stream.object().type_name()
            );
        }
    }

    #[test]
    fn hashes_match_fixtures() {
        for fixture in fixtures() {
            assert_eq!(
                fixture.stream.hash(),
                sha(fixture.hash),
                "hash mismatch for {}",
                fixture.stream.object().type_name()
            );
        }
    }

    #[test]
    fn decode_reconstructs_objects() {
        for fixture in fixtures() {
            let decoded = Stream::decode(&fixture.body).unwrap();
            assert_eq!(decoded.object(), fixture.stream.object());
            assert_eq!(decoded.bytes(), fixture.body.as_slice());
            assert_eq!(decoded.hash(), sha(fixture.hash));
        }
    }

    #[test]
    fn hash_is_cached() {
        let stream = Stream::new(Blob::new(&b"cache me"[..]).into());
        let first = stream.hash();
        assert_eq!(stream.hash(), first);
    }

    #[test]
    fn rejects_unknown_type() {
        let err = Stream::decode(b"changeset 2\x00ok").unwrap_err();
        assert!(matches!(err, ObjectError::UnknownObjectType { .. }));
    }

    #[test]
    fn rejects_malformed_envelopes() {
        assert!(Stream::decode(b"blobless").is_err());
        assert!(Stream::decode(b"blob 16 no nul").is_err());
        assert!(Stream::decode(b"blob xx\x00ab").is_err());
        // Declared size disagrees with payload.
        assert!(Stream::decode(b"blob 3\x00ab").is_err());
        assert!(Stream::decode(b"blob 1\x00ab").is_err());
    }
}
