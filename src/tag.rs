//! Annotated tag objects.
//!
//! Git has two kinds of tags: a lightweight tag is merely a ref pointing
//! at a commit, while an annotated tag is an object of its own with a
//! tagger stamp and a message. This type is the latter.
//!
//! # Tag Payload Format
//! ```text
//! object <hex-checksum>\n
//! type <object-type>\n
//! tag <name>\n
//! tagger <name> <email> <secs> ±HHMM\n
//! \n
//! <message>\n
//! ```

use std::cell::OnceCell;

use crate::errors::ObjectError;
use crate::fields::{encode_block, parse_block, Singleton};
use crate::object_id::Sha1;
use crate::person::PersonTime;

/// An annotated tag. The tagged object is almost always a commit.
#[derive(Clone, Debug)]
pub struct Tag {
    object: Sha1,
    object_type: String,
    name: String,
    tagger: PersonTime,
    message: String,
    payload: OnceCell<Vec<u8>>,
}

impl Tag {
    /// Creates an annotated tag.
    #[must_use]
    pub fn new(
        object: Sha1,
        object_type: impl Into<String>,
        name: impl Into<String>,
        tagger: PersonTime,
        message: impl Into<String>,
    ) -> Self {
        Self {
            object,
            object_type: object_type.into(),
            name: name.into(),
            tagger,
            message: message.into(),
            payload: OnceCell::new(),
        }
    }

    /// Returns the checksum of the tagged object.
    #[must_use]
    pub fn object(&self) -> Sha1 {
        self.object
    }

    /// Returns the tagged object's type name.
    #[must_use]
    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    /// Returns the tag name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tagger stamp.
    #[must_use]
    pub fn tagger(&self) -> &PersonTime {
        &self.tagger
    }

    /// Returns the tag message.
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
            let fields = [
                ("object", self.object.to_string()),
                ("type", self.object_type.clone()),
                ("tag", self.name.clone()),
                ("tagger", self.tagger.to_string()),
            ];

            let mut out = Vec::new();
            encode_block(&fields, &self.message, &mut out);
            out
        })
    }

    /// Appends the canonical payload to `out`.
    pub fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.payload_bytes());
    }

    /// Decodes a tag payload.
    ///
    /// # Errors
    /// - `MalformedField` for a missing blank line or missing/duplicate
    ///   singleton fields.
    /// - `MalformedSha1` / `MalformedPerson` for bad field values.
    /// - `UnrecognizedField` for any field name outside the tag vocabulary.
    pub fn decode(payload: &[u8]) -> Result<Self, ObjectError> {
        let block = parse_block(payload)?;

        let mut object = Singleton::new("duplicate object field", "missing object field");
        let mut object_type = Singleton::new("duplicate type field", "missing type field");
        let mut name = Singleton::new("duplicate tag field", "missing tag field");
        let mut tagger = Singleton::new("duplicate tagger field", "missing tagger field");

        for field in &block.fields {
            match field.name {
                "object" => object.set(Sha1::from_hex(field.value)?)?,
                "type" => object_type.set(field.value.to_string())?,
                "tag" => name.set(field.value.to_string())?,
                "tagger" => tagger.set(PersonTime::parse(field.value)?)?,
                other => {
                    return Err(ObjectError::UnrecognizedField {
                        name: other.to_string(),
                    })
                }
            }
        }

        Ok(Self::new(
            object.take()?,
            object_type.take()?,
            name.take()?,
            tagger.take()?,
            block.message,
        ))
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
            && self.object_type == other.object_type
            && self.name == other.name
            && self.tagger == other.tagger
            && self.message == other.message
    }
}

impl Eq for Tag {}
