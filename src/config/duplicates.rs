//! Classification of "already exists" errors

use crate::error::{Error, Result};
use regex::Regex;

/// Error code the 5.x and 6.x servers use for duplicate objects.
///
/// It is the generic "Invalid params." code, so it is only trusted together
/// with a message pattern.
pub const DEFAULT_DUPLICATE_CODE: i64 = -32602;

/// Message fragment the server uses for duplicate objects
pub const DEFAULT_DUPLICATE_PATTERN: &str = "already exists";

/// Decides which remote errors mean the object is already present
///
/// A remote error is a duplicate when its code is one of `codes` and, if any
/// patterns are configured, its message or data matches one of them.
#[derive(Debug, Clone)]
pub struct DuplicatePolicy {
    codes: Vec<i64>,
    patterns: Vec<Regex>,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self {
            codes: vec![DEFAULT_DUPLICATE_CODE],
            patterns: Regex::new(DEFAULT_DUPLICATE_PATTERN).into_iter().collect(),
        }
    }
}

impl DuplicatePolicy {
    /// Build a policy from codes and regex patterns
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a pattern is not a valid regex.
    pub fn new(codes: Vec<i64>, patterns: &[impl AsRef<str>]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    Error::Config(format!("Invalid duplicate pattern '{}': {e}", p.as_ref()))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { codes, patterns })
    }

    pub fn codes(&self) -> &[i64] {
        &self.codes
    }

    /// Whether a remote error reports a duplicate object
    #[must_use]
    pub fn is_duplicate(&self, error: &Error) -> bool {
        let Error::Remote {
            code,
            message,
            data,
        } = error
        else {
            return false;
        };

        self.codes.contains(code)
            && (self.patterns.is_empty()
                || self
                    .patterns
                    .iter()
                    .any(|p| p.is_match(message) || p.is_match(data)))
    }

    /// Turn a duplicate report into [`Error::DuplicateObject`], pass anything else through
    #[must_use]
    pub fn classify(&self, error: Error) -> Error {
        if !self.is_duplicate(&error) {
            return error;
        }
        match error {
            Error::Remote { message, data, .. } => {
                Error::DuplicateObject(if data.is_empty() { message } else { data })
            }
            other => other,
        }
    }
}
