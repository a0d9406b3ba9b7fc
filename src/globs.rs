//! Glob tables for ignore and exclude files.
//!
//! A glob table is one shell glob per line; `#` starts a comment and
//! blank lines are ignored. The repository's `.gitignore` and
//! `info/exclude` files both take this shape. Matching asks whether a
//! name matches any pattern in the table.

use std::fmt;
use std::io;
use std::path::Path;

use glob::Pattern;

/// Errors from glob table loading.
#[derive(Debug)]
#[non_exhaustive]
pub enum GlobsError {
    /// I/O error reading the table file.
    Io(io::Error),
    /// A line is not a valid glob pattern.
    BadPattern { pattern: String, detail: String },
}

impl fmt::Display for GlobsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::BadPattern { pattern, detail } => {
                write!(f, "bad glob pattern {pattern:?}: {detail}")
            }
        }
    }
}

impl std::error::Error for GlobsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for GlobsError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// A list of shell glob patterns.
#[derive(Clone, Debug, Default)]
pub struct GlobTable {
    patterns: Vec<Pattern>,
}

impl GlobTable {
    /// Loads a glob table from a file.
    pub fn at_path(path: &Path) -> Result<Self, GlobsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    /// Parses glob table text, compiling each pattern.
    ///
    /// # Errors
    /// Returns `BadPattern` for a line `glob::Pattern` rejects.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, GlobsError> {
        let mut patterns = Vec::new();
        for line in text.lines() {
            let line = match line.find('#') {
                Some(pound) => &line[..pound],
                None => line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let pattern = Pattern::new(line).map_err(|err| GlobsError::BadPattern {
                pattern: line.to_string(),
                detail: err.to_string(),
            })?;
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    /// Returns the pattern strings in file order.
    #[must_use]
    pub fn patterns(&self) -> Vec<&str> {
        self.patterns.iter().map(Pattern::as_str).collect()
    }

    /// Returns true if the name matches any pattern in the table.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_patterns_skipping_comments() {
        let table = GlobTable::from_str(
            "# build output\n\
             *.o\n\
             \n\
             target  # cargo\n\
             .DS_Store\n",
        )
        .unwrap();

        assert_eq!(table.patterns(), ["*.o", "target", ".DS_Store"]);
    }

    #[test]
    fn matches_any_pattern() {
        let table = GlobTable::from_str("*.o\n*.tmp\n").unwrap();
        assert!(table.matches("main.o"));
        assert!(table.matches("scratch.tmp"));
        assert!(!table.matches("main.rs"));
    }

    #[test]
    fn empty_table_matches_nothing() {
        let table = GlobTable::from_str("# only comments\n").unwrap();
        assert!(!table.matches("anything"));
    }

    #[test]
    fn bad_pattern_is_rejected() {
        assert!(matches!(
            GlobTable::from_str("a[\n").unwrap_err(),
            GlobsError::BadPattern { .. }
        ));
    }
}
