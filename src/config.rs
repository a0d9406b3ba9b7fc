//! INI-style configuration files.
//!
//! A config file is a sequence of `[section]` headers, each followed by
//! `key = value` entries. Lines starting with `#` or `;` are comments;
//! blank lines are ignored. Values are typed: a decimal integer, a
//! boolean literal, or a string, represented as a tagged enum rather than
//! a dynamic type.
//!
//! # Canonical Rendering
//! Rendering normalizes whatever whitespace the input carried: section
//! headers on their own line, entries tab-indented with a single space
//! around `=`, keys sorted within a section, sections separated by one
//! blank line. Strings are double-quoted only when they contain
//! whitespace.

use std::fmt;
use std::io;
use std::path::Path;

/// Errors from config decoding.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error reading the config file.
    Io(io::Error),
    /// A line violates the section or entry shape.
    MalformedConfigEntry { detail: &'static str },
}

impl ConfigError {
    #[inline]
    const fn entry(detail: &'static str) -> Self {
        Self::MalformedConfigEntry { detail }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::MalformedConfigEntry { detail } => {
                write!(f, "malformed config entry: {detail}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// A typed config value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl Value {
    /// Classifies a raw value string.
    ///
    /// A leading double quote selects quoted-string parsing, a leading
    /// digit selects integer parsing, `true`/`false` are booleans, and
    /// anything else is a bare string.
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        if let Some(first) = raw.chars().next() {
            if first == '"' {
                return unquote(raw).map(Value::Str);
            }
            if first.is_ascii_digit() {
                return raw
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| ConfigError::entry("value is not a valid integer"));
            }
        }
        match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Ok(Value::Str(raw.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Str(value) => {
                if value.chars().any(char::is_whitespace) {
                    write!(f, "{}", quote(value))
                } else {
                    write!(f, "{value}")
                }
            }
        }
    }
}

/// A named section holding key-value entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, Value)>,
}

impl Section {
    /// Creates an empty section.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Returns the section name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Sets a key, replacing any earlier occurrence.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Renders the section: the bracketed name, then entries tab-indented
    /// with keys sorted.
    fn render_into(&self, out: &mut String) {
        out.push('[');
        out.push_str(&self.name);
        out.push_str("]\n");

        let mut keys: Vec<&str> = self.entries.iter().map(|(key, _)| key.as_str()).collect();
        keys.sort_unstable();
        for key in keys {
            let value = self.get(key).expect("key came from this section");
            out.push('\t');
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(&value.to_string());
            out.push('\n');
        }
    }
}

/// A decoded config file: sections in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    sections: Vec<Section>,
}

impl Config {
    /// Reads and decodes a config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    /// Decodes config text.
    ///
    /// # Errors
    /// Returns `MalformedConfigEntry` for an unterminated section header,
    /// an entry outside any section, an entry without `=`, or an
    /// unparsable value.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        let mut sections: Vec<Section> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or(ConfigError::entry("unterminated section header"))?
                    .trim();
                sections.push(Section::new(name));
                continue;
            }

            let section = sections
                .last_mut()
                .ok_or(ConfigError::entry("entry before any section header"))?;
            let (key, raw) = line
                .split_once('=')
                .ok_or(ConfigError::entry("entry has no '='"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::entry("entry has an empty key"));
            }
            section.set(key, Value::parse(raw.trim())?);
        }

        Ok(Self { sections })
    }

    /// Returns a section by name.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// Returns the sections in first-seen order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Renders the canonical form: sections in order, separated by one
    /// blank line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            section.render_into(&mut out);
        }
        out
    }
}

/// Quotes a string with backslash escapes for `"`, `\`, newline, and tab.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Reverses `quote`.
fn unquote(raw: &str) -> Result<String, ConfigError> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or(ConfigError::entry("unterminated quoted string"))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            _ => return Err(ConfigError::entry("unknown escape in quoted string")),
        }
    }
    Ok(out)
}
