//! Run identifiers.
//!
//! A [`RunId`] names the output directory of one conversion. Generated ids
//! are v4 UUIDs; callers may also supply their own string, which must be a
//! single usable path component.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Identifier of one conversion run, used as the run directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Create a new random ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a caller-supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the identifier is empty, is `.`
    /// or `..`, or contains a path separator.
    pub fn from_caller(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidRequest("run identifier is empty".into()));
        }
        if id == "." || id == ".." || id.contains(['/', '\\']) || id.contains('\0') {
            return Err(Error::InvalidRequest(format!(
                "run identifier '{id}' is not a single path component"
            )));
        }
        Ok(Self(id))
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RunId {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_caller(s)
    }
}

/// Deserialized ids go through [`RunId::from_caller`] like any other
/// caller-supplied string.
impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let id = String::deserialize(deserializer)?;
        Self::from_caller(id).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
