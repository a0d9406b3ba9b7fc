//! Refs: loose refs, symbolic refs, and the packed-refs file.
//!
//! A ref is a slash-separated name pointing at an object's SHA-1. A loose
//! ref is a file at `<repo>/<name>` holding forty hex characters and a
//! newline. Rarely-updated refs get gathered into one `packed-refs` file.
//! A symbolic ref is a file whose content names another ref instead of an
//! object; HEAD is the prominent example.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::ObjectError;
use crate::object_id::Sha1;

/// Magic header line of a packed-refs file.
const PACKED_REFS_HEADER: &str = "# pack-refs with: peeled fully-peeled \n";

/// Prefix of a symref file's content.
const SYMREF_MAGIC: &str = "ref: ";

/// Errors from ref decoding.
#[derive(Debug)]
#[non_exhaustive]
pub enum RefError {
    /// A loose ref or packed-refs line is not well-formed.
    InvalidRef,
    /// A symref file does not start with `ref: `.
    InvalidSymref,
    /// A symref target does not start with `refs/`.
    InvalidSymrefTarget,
}

impl fmt::Display for RefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRef => write!(f, "ref not well-formed"),
            Self::InvalidSymref => write!(f, "invalid symref header"),
            Self::InvalidSymrefTarget => write!(f, "invalid symref target"),
        }
    }
}

impl std::error::Error for RefError {}

impl From<ObjectError> for RefError {
    fn from(_: ObjectError) -> Self {
        Self::InvalidRef
    }
}

/// A named pointer to an object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ref {
    pub name: String,
    pub sha: Sha1,
}

impl Ref {
    /// Returns the path this ref would occupy as a loose ref file under
    /// the given repository root.
    #[must_use]
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }

    /// Decodes a loose ref file: exactly forty hex characters and a
    /// newline, forty-one bytes in all.
    ///
    /// # Errors
    /// Returns `InvalidRef` for any other shape.
    pub fn decode(data: &[u8]) -> Result<Sha1, RefError> {
        if data.len() < 41 || data[40] != b'\n' {
            return Err(RefError::InvalidRef);
        }
        let hex = std::str::from_utf8(&data[..40]).map_err(|_| RefError::InvalidRef)?;
        Ok(Sha1::from_hex(hex)?)
    }

    /// Encodes the loose ref file content for this ref.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.sha.to_string().into_bytes();
        out.push(b'\n');
        out
    }
}

/// A symbolic ref: a name pointing at another ref.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symref {
    pub target: String,
}

impl Symref {
    /// Decodes a symref file: `ref: <target>` with an optional trailing
    /// newline tolerated.
    ///
    /// # Errors
    /// - `InvalidSymref` when the magic prefix is missing or the content
    ///   is not UTF-8.
    /// - `InvalidSymrefTarget` when the target does not start with
    ///   `refs/`.
    pub fn decode(data: &[u8]) -> Result<Self, RefError> {
        let text = std::str::from_utf8(data).map_err(|_| RefError::InvalidSymref)?;
        let rest = text.strip_prefix(SYMREF_MAGIC).ok_or(RefError::InvalidSymref)?;

        let target = match rest.split_once('\n') {
            Some((target, _)) => target,
            None => rest,
        };
        if !target.starts_with("refs/") {
            return Err(RefError::InvalidSymrefTarget);
        }

        Ok(Self {
            target: target.to_string(),
        })
    }

    /// Encodes the symref file content.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        format!("{SYMREF_MAGIC}{}", self.target).into_bytes()
    }
}

/// The packed-refs file: many refs gathered into one ordered list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackedRefs {
    refs: Vec<Ref>,
}

impl PackedRefs {
    /// Creates a packed-refs list from refs in order.
    #[must_use]
    pub fn new(refs: Vec<Ref>) -> Self {
        Self { refs }
    }

    /// Returns the refs in file order.
    #[must_use]
    pub fn refs(&self) -> &[Ref] {
        &self.refs
    }

    /// Decodes a packed-refs file.
    ///
    /// Everything from a `#` to the end of its line is a comment; blank
    /// lines are ignored. A data line is `<sha-hex> <name>`.
    ///
    /// # Errors
    /// Returns `InvalidRef` for a data line without a name or with a
    /// malformed checksum.
    pub fn decode(data: &[u8]) -> Result<Self, RefError> {
        let text = std::str::from_utf8(data).map_err(|_| RefError::InvalidRef)?;

        let mut refs = Vec::new();
        for line in text.split('\n') {
            let line = match line.find('#') {
                Some(pound) => &line[..pound],
                None => line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (hex, name) = line.split_once(' ').ok_or(RefError::InvalidRef)?;
            refs.push(Ref {
                name: name.to_string(),
                sha: Sha1::from_hex(hex)?,
            });
        }

        Ok(Self { refs })
    }

    /// Encodes the packed-refs file: the magic header line, then one
    /// `<sha> <name>` line per ref.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = PACKED_REFS_HEADER.as_bytes().to_vec();
        for r in &self.refs {
            out.extend_from_slice(r.sha.to_string().as_bytes());
            out.push(b' ');
            out.extend_from_slice(r.name.as_bytes());
            out.push(b'\n');
        }
        out
    }

    /// Scans for a ref by name. Lookup is a linear scan in file order.
    #[must_use]
    pub fn sha1_for_name(&self, name: &str) -> Option<Sha1> {
        self.refs
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.sha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA_A: &str = "bd9dbf5aae1a3862dd1526723246b20206e5fc37";
    const SHA_B: &str = "7400f1589a11d1b912d6a90574d4f836087599b1";

    fn sha(hex: &str) -> Sha1 {
        Sha1::from_hex(hex).unwrap()
    }

    #[test]
    fn loose_ref_decodes_41_bytes() {
        let content = format!("{SHA_A}\n");
        assert_eq!(Ref::decode(content.as_bytes()).unwrap(), sha(SHA_A));
    }

    #[test]
    fn loose_ref_rejects_other_shapes() {
        assert!(matches!(
            Ref::decode(SHA_A.as_bytes()),
            Err(RefError::InvalidRef)
        ));
        assert!(Ref::decode(b"short\n").is_err());
        let no_newline = format!("{SHA_A}x");
        assert!(Ref::decode(no_newline.as_bytes()).is_err());
        let bad_hex = format!("{}\n", SHA_A.to_uppercase());
        assert!(Ref::decode(bad_hex.as_bytes()).is_err());
    }

    #[test]
    fn loose_ref_round_trips() {
        let r = Ref {
            name: "refs/heads/master".to_string(),
            sha: sha(SHA_A),
        };
        assert_eq!(Ref::decode(&r.encode()).unwrap(), r.sha);
        assert_eq!(
            r.path(Path::new("/repo")),
            Path::new("/repo/refs/heads/master")
        );
    }

    #[test]
    fn symref_decodes_with_and_without_newline() {
        let bare = Symref::decode(b"ref: refs/heads/main").unwrap();
        assert_eq!(bare.target, "refs/heads/main");

        let newline = Symref::decode(b"ref: refs/heads/main\n").unwrap();
        assert_eq!(newline.target, "refs/heads/main");
    }

    #[test]
    fn symref_round_trips() {
        let symref = Symref {
            target: "refs/heads/main".to_string(),
        };
        assert_eq!(symref.encode(), b"ref: refs/heads/main");
        assert_eq!(Symref::decode(&symref.encode()).unwrap(), symref);
    }

    #[test]
    fn symref_rejects_bad_magic_and_target() {
        assert!(matches!(
            Symref::decode(b"symlink: refs/heads/main"),
            Err(RefError::InvalidSymref)
        ));
        assert!(matches!(
            Symref::decode(b"ref: heads/main"),
            Err(RefError::InvalidSymrefTarget)
        ));
    }

    #[test]
    fn packed_refs_decode_skips_comments_and_blanks() {
        let content = format!(
            "# pack-refs with: peeled fully-peeled \n\
             \n\
             {SHA_A} refs/heads/master\n\
             {SHA_B} refs/tags/v1.0  # trailing comment\n"
        );
        let packed = PackedRefs::decode(content.as_bytes()).unwrap();

        assert_eq!(packed.refs().len(), 2);
        assert_eq!(packed.sha1_for_name("refs/heads/master"), Some(sha(SHA_A)));
        assert_eq!(packed.sha1_for_name("refs/tags/v1.0"), Some(sha(SHA_B)));
        assert_eq!(packed.sha1_for_name("refs/heads/missing"), None);
    }

    #[test]
    fn packed_refs_encode_emits_header() {
        let packed = PackedRefs::new(vec![Ref {
            name: "refs/heads/master".to_string(),
            sha: sha(SHA_A),
        }]);

        let encoded = packed.encode();
        let text = std::str::from_utf8(&encoded).unwrap();
        assert!(text.starts_with("# pack-refs with: peeled fully-peeled \n"));
        assert!(text.ends_with(&format!("{SHA_A} refs/heads/master\n")));

        assert_eq!(PackedRefs::decode(&encoded).unwrap(), packed);
    }

    #[test]
    fn packed_refs_rejects_malformed_lines() {
        assert!(PackedRefs::decode(b"justonefield\n").is_err());
        let bad = format!("{} \n", &SHA_A[..20]);
        assert!(PackedRefs::decode(bad.as_bytes()).is_err());
    }
}
