//! Blob objects.

/// A blob stores file contents as an opaque byte buffer. Blobs carry no
/// name; trees hold that responsibility.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Blob {
    content: Vec<u8>,
}

impl Blob {
    /// Creates a blob from raw content bytes.
    #[must_use]
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Returns the blob's content.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns the content length, which is the canonical payload size.
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Decodes a payload. The payload is the content, verbatim.
    #[must_use]
    pub fn decode(payload: &[u8]) -> Self {
        Self {
            content: payload.to_vec(),
        }
    }

    /// Appends the canonical payload to `out`.
    pub fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_content_verbatim() {
        let blob = Blob::new(&b"what is up, doc?"[..]);
        assert_eq!(blob.size(), 16);

        let mut out = Vec::new();
        blob.encode_payload(&mut out);
        assert_eq!(out, b"what is up, doc?");
        assert_eq!(Blob::decode(&out), blob);
    }

    #[test]
    fn empty_blob() {
        let blob = Blob::default();
        assert_eq!(blob.size(), 0);
        assert_eq!(Blob::decode(b""), blob);
    }
}
