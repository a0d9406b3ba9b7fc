//! Author and timestamp stamps for commits and tags.
//!
//! The textual form is `Name <email> <unix-seconds> ±HHMM`. Whitespace
//! between the name and the opening angle bracket may be arbitrarily long
//! but must be present; the name is stored trimmed. The timezone is kept
//! only for re-serialization: equality compares the instant and ignores
//! the zone.

use std::fmt;

use crate::errors::ObjectError;

/// An author: a name and an email, both UTF-8.
///
/// # Invariants
/// - The email never contains `<` or `>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Author {
    name: String,
    email: String,
}

impl Author {
    /// Creates an author, validating the email.
    ///
    /// # Errors
    /// Returns `MalformedPerson` if the email contains `<` or `>`.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Result<Self, ObjectError> {
        let name = name.into();
        let email = email.into();
        if email.contains('<') || email.contains('>') {
            return Err(ObjectError::MalformedPerson {
                detail: "email contains an angle bracket",
            });
        }
        Ok(Self { name, email })
    }

    /// Returns the author's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the author's email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Parses the `Name <email>` form.
    ///
    /// # Errors
    /// Returns `MalformedPerson` if either angle bracket is missing or the
    /// whitespace between name and email is absent.
    pub fn parse(s: &str) -> Result<Self, ObjectError> {
        let open = s.find('<').ok_or(ObjectError::MalformedPerson {
            detail: "missing '<' before email",
        })?;
        let close = s[open..].find('>').map(|i| open + i).ok_or(
            ObjectError::MalformedPerson {
                detail: "missing '>' after email",
            },
        )?;

        let raw_name = &s[..open];
        if !raw_name.is_empty() && !raw_name.ends_with(char::is_whitespace) {
            return Err(ObjectError::MalformedPerson {
                detail: "missing whitespace between name and email",
            });
        }

        Self::new(raw_name.trim(), &s[open + 1..close])
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// An author paired with a moment in time: the `author`, `committer`, and
/// `tagger` value shape.
#[derive(Clone, Debug, Eq)]
pub struct PersonTime {
    author: Author,
    unix_seconds: i64,
    tz_offset_seconds: i32,
}

impl PersonTime {
    /// Creates a person-time from an author, a Unix time in seconds, and a
    /// timezone offset from UTC in seconds.
    #[must_use]
    pub fn new(author: Author, unix_seconds: i64, tz_offset_seconds: i32) -> Self {
        Self {
            author,
            unix_seconds,
            tz_offset_seconds,
        }
    }

    /// Returns the author.
    #[must_use]
    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Returns the Unix time in seconds.
    #[must_use]
    pub fn unix_seconds(&self) -> i64 {
        self.unix_seconds
    }

    /// Returns the timezone offset from UTC in seconds.
    #[must_use]
    pub fn tz_offset_seconds(&self) -> i32 {
        self.tz_offset_seconds
    }

    /// Parses the `Name <email> <seconds> ±HHMM` form.
    ///
    /// # Errors
    /// Returns `MalformedPerson` if the author part is malformed, the time
    /// component does not have exactly two fields, the seconds are not a
    /// decimal integer, or the timezone is not `±HHMM`.
    pub fn parse(s: &str) -> Result<Self, ObjectError> {
        let close = s.find('>').ok_or(ObjectError::MalformedPerson {
            detail: "missing '>' after email",
        })?;
        let author = Author::parse(&s[..=close])?;

        let rest = s[close + 1..].trim();
        let mut parts = rest.split(' ').filter(|part| !part.is_empty());
        let (secs, tz) = match (parts.next(), parts.next(), parts.next()) {
            (Some(secs), Some(tz), None) => (secs, tz),
            _ => {
                return Err(ObjectError::MalformedPerson {
                    detail: "time component does not have exactly two fields",
                })
            }
        };

        let unix_seconds = secs.parse::<i64>().map_err(|_| ObjectError::MalformedPerson {
            detail: "seconds component is not a decimal integer",
        })?;
        let tz_offset_seconds = parse_tz_offset(tz)?;

        Ok(Self::new(author, unix_seconds, tz_offset_seconds))
    }

    fn tz_string(&self) -> String {
        let sign = if self.tz_offset_seconds < 0 { '-' } else { '+' };
        let abs = self.tz_offset_seconds.unsigned_abs();
        format!("{}{:02}{:02}", sign, abs / 3600, (abs % 3600) / 60)
    }
}

impl fmt::Display for PersonTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.author,
            self.unix_seconds,
            self.tz_string()
        )
    }
}

impl PartialEq for PersonTime {
    /// Compares author and instant; the timezone is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.author == other.author && self.unix_seconds == other.unix_seconds
    }
}

/// Parses a `±HHMM` timezone into an offset in seconds.
fn parse_tz_offset(tz: &str) -> Result<i32, ObjectError> {
    let malformed = ObjectError::MalformedPerson {
        detail: "timezone is not of the form ±HHMM",
    };

    let bytes = tz.as_bytes();
    if bytes.len() != 5 || !bytes[1..].iter().all(u8::is_ascii_digit) {
        return Err(malformed);
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(malformed),
    };

    let hours = i32::from(bytes[1] - b'0') * 10 + i32::from(bytes[2] - b'0');
    let minutes = i32::from(bytes[3] - b'0') * 10 + i32::from(bytes[4] - b'0');
    Ok(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str, email: &str, secs: i64, offset: i32) -> PersonTime {
        PersonTime::new(Author::new(name, email).unwrap(), secs, offset)
    }

    #[test]
    fn renders_canonical_form() {
        let p = person("Kosuke Asami", "tfortress58@gmail.com", 1395160458, 9 * 3600);
        assert_eq!(
            p.to_string(),
            "Kosuke Asami <tfortress58@gmail.com> 1395160458 +0900"
        );

        let p = person("Jack Nagel", "jacknagel@gmail.com", 1395293290, -5 * 3600);
        assert_eq!(
            p.to_string(),
            "Jack Nagel <jacknagel@gmail.com> 1395293290 -0500"
        );
    }

    #[test]
    fn renders_half_hour_offsets() {
        let p = person("A", "a@b.c", 0, 5 * 3600 + 30 * 60);
        assert_eq!(p.to_string(), "A <a@b.c> 0 +0530");
    }

    #[test]
    fn parses_canonical_form() {
        let p = PersonTime::parse("Kosuke Asami <tfortress58@gmail.com> 1395160458 +0900")
            .unwrap();
        assert_eq!(p.author().name(), "Kosuke Asami");
        assert_eq!(p.author().email(), "tfortress58@gmail.com");
        assert_eq!(p.unix_seconds(), 1395160458);
        assert_eq!(p.tz_offset_seconds(), 9 * 3600);
    }

    #[test]
    fn parse_round_trips() {
        let original = person("David Heinemeier Hansson", "david@loudthinking.com", 1395778247, 3600);
        let parsed = PersonTime::parse(&original.to_string()).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.to_string(), original.to_string());
    }

    #[test]
    fn tolerates_wide_whitespace_before_email() {
        let p = PersonTime::parse("Jane Doe    <jane@example.com> 100 -0000").unwrap();
        assert_eq!(p.author().name(), "Jane Doe");
        assert_eq!(p.author().email(), "jane@example.com");
    }

    #[test]
    fn equality_ignores_timezone() {
        let tokyo = person("A", "a@b.c", 1395160458, 9 * 3600);
        let utc = person("A", "a@b.c", 1395160458, 0);
        let later = person("A", "a@b.c", 1395160459, 9 * 3600);
        assert_eq!(tokyo, utc);
        assert_ne!(tokyo, later);
    }

    #[test]
    fn rejects_angle_brackets_in_email() {
        assert!(Author::new("A", "a<b@c.d").is_err());
        assert!(Author::new("A", "a>b@c.d").is_err());
    }

    #[test]
    fn rejects_malformed_stamps() {
        assert!(PersonTime::parse("no brackets at all").is_err());
        assert!(PersonTime::parse("A <a@b.c>").is_err());
        assert!(PersonTime::parse("A <a@b.c> 100").is_err());
        assert!(PersonTime::parse("A <a@b.c> 100 +0900 extra").is_err());
        assert!(PersonTime::parse("A <a@b.c> notasecond +0900").is_err());
        assert!(PersonTime::parse("A <a@b.c> 100 0900").is_err());
        assert!(PersonTime::parse("A <a@b.c> 100 +900").is_err());
    }

    #[test]
    fn negative_timestamps_parse() {
        let p = PersonTime::parse("A <a@b.c> -86400 +0000").unwrap();
        assert_eq!(p.unix_seconds(), -86400);
    }
}
