//! Root path validation
//!
//! The root argument is untrusted input, so it is held to a deliberately
//! narrow grammar instead of being normalized:
//!
//! ```text
//! root    := segment ("/" segment)*
//! segment := [A-Za-z0-9.]+        (but never "..")
//! ```
//!
//! Validation never touches the filesystem. A [`RootPath`] can only be
//! obtained through [`RootPath::parse`], so every API taking one is already
//! past the check.

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::errors::HarnessError;

/// Separator between path segments.
const SEPARATOR: char = '/';

/// Parent-directory segment; rejected because it escapes the base directory.
const PARENT_SEGMENT: &str = "..";

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.'
}

/// A validated, relative root directory argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootPath(String);

impl RootPath {
    /// Validate a raw argument.
    ///
    /// ## Errors
    ///
    /// Returns [`HarnessError::InvalidPath`] if the value is not UTF-8, is
    /// empty or absolute, has an empty segment, contains a `..` segment, or
    /// uses any character outside `[A-Za-z0-9.]`.
    pub fn parse(value: impl AsRef<OsStr>) -> Result<Self, HarnessError> {
        let raw = value.as_ref();
        let Some(text) = raw.to_str() else {
            return Err(HarnessError::invalid_path(
                raw.to_string_lossy(),
                "not a path-like string (invalid UTF-8)",
            ));
        };

        if text.is_empty() {
            return Err(HarnessError::invalid_path(text, "path is empty"));
        }
        if text.starts_with(SEPARATOR) {
            return Err(HarnessError::invalid_path(text, "absolute paths are not allowed"));
        }

        for segment in text.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(HarnessError::invalid_path(text, "empty path segment"));
            }
            if segment == PARENT_SEGMENT {
                return Err(HarnessError::invalid_path(text, "'..' segments are not allowed"));
            }
            if let Some(bad) = segment.chars().find(|c| !is_allowed_char(*c)) {
                return Err(HarnessError::invalid_path(text, format!("character {bad:?} is not allowed")));
            }
        }

        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl FromStr for RootPath {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<Path> for RootPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl fmt::Display for RootPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
