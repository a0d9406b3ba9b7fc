//! Shared field-block codec for commits and tags.
//!
//! Both object types serialize as a block of `<name> <value>` lines, a
//! blank line, and a free-form message. They differ only in their field
//! vocabulary and in what they build from the parsed fields.
//!
//! # Format
//! ```text
//! <name> <value>\n    (one or more)
//! \n
//! <message>\n
//! ```
//!
//! The message is stored with trailing whitespace trimmed; interior
//! whitespace is preserved. Encoding appends the final newline back.

use crate::errors::ObjectError;

/// A single `<name> <value>` line from a field block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Field<'a> {
    pub(crate) name: &'a str,
    pub(crate) value: &'a str,
}

/// A parsed field block: the ordered fields and the trimmed message.
#[derive(Clone, Debug)]
pub(crate) struct FieldBlock<'a> {
    pub(crate) fields: Vec<Field<'a>>,
    pub(crate) message: &'a str,
}

/// Parses a field block from an object payload.
///
/// Reads `<name> <value>` lines until the blank separator line; everything
/// after it is the message, trailing whitespace trimmed.
///
/// # Errors
/// - `MalformedField` if the payload is not UTF-8, has no blank separator
///   line, or contains a line without a space between name and value.
pub(crate) fn parse_block(payload: &[u8]) -> Result<FieldBlock<'_>, ObjectError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| ObjectError::field("field block is not UTF-8"))?;

    let (head, message) = text
        .split_once("\n\n")
        .ok_or(ObjectError::field("missing blank line before message"))?;

    let mut fields = Vec::new();
    for line in head.split('\n') {
        let (name, value) = line
            .split_once(' ')
            .ok_or(ObjectError::field("field line has no value"))?;
        if name.is_empty() {
            return Err(ObjectError::field("field line has an empty name"));
        }
        fields.push(Field { name, value });
    }

    Ok(FieldBlock {
        fields,
        message: message.trim_end(),
    })
}

/// Encodes a field block: each field on its own line, a blank separator,
/// the message, and a final newline.
pub(crate) fn encode_block(fields: &[(&str, String)], message: &str, out: &mut Vec<u8>) {
    for (name, value) in fields {
        out.extend_from_slice(name.as_bytes());
        out.push(b' ');
        out.extend_from_slice(value.as_bytes());
        out.push(b'\n');
    }
    out.push(b'\n');
    out.extend_from_slice(message.as_bytes());
    out.push(b'\n');
}

/// Tracks singleton fields while loading a parsed block.
///
/// Decoders call `set` once per occurrence; a second occurrence or a
/// missing mandatory field is a `MalformedField`.
pub(crate) struct Singleton<T> {
    value: Option<T>,
    duplicate: &'static str,
    missing: &'static str,
}

impl<T> Singleton<T> {
    pub(crate) const fn new(duplicate: &'static str, missing: &'static str) -> Self {
        Self {
            value: None,
            duplicate,
            missing,
        }
    }

    pub(crate) fn set(&mut self, value: T) -> Result<(), ObjectError> {
        if self.value.is_some() {
            return Err(ObjectError::field(self.duplicate));
        }
        self.value = Some(value);
        Ok(())
    }

    pub(crate) fn take(self) -> Result<T, ObjectError> {
        self.value.ok_or(ObjectError::field(self.missing))
    }
}
