//! Unified error type for hlsladder.
//!
//! All crates funnel their failures into [`Error`]. The variants follow the
//! lifecycle of a conversion: validation failures are raised before any
//! encode starts, `EncodeFailure` and `Cancelled` only after the fan-out.

use std::fmt;
use std::path::{Path, PathBuf};

/// Unified error type covering all failure modes in hlsladder.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A quality catalog entry is malformed or duplicated.
    #[error("Invalid quality profile: {0}")]
    InvalidProfile(String),

    /// The caller's request (qualities, source name, run id) is unusable.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Resolution produced no qualities to encode.
    #[error("No qualities selected for encoding")]
    EmptySelection,

    /// The source file does not exist.
    #[error("Source file not found: {}", path.display())]
    SourceNotFound {
        /// Full path that was checked.
        path: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// Path the operation targeted.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// One quality's external encode failed.
    #[error("Encode failed for quality {quality}: {cause}")]
    EncodeFailure {
        /// Name of the quality profile whose job failed.
        quality: String,
        /// Human-readable cause reported by the encoder.
        cause: String,
    },

    /// An external tool could not be spawned, exited non-zero, or timed out.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Configuration failed to parse or validate.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The run was cancelled before every job finished.
    #[error("Conversion cancelled")]
    Cancelled,
}

impl Error {
    /// Map this error to a process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidProfile(_)
            | Error::InvalidRequest(_)
            | Error::EmptySelection
            | Error::Validation(_) => 2,
            Error::SourceNotFound { .. } => 3,
            Error::Io { .. } => 4,
            Error::EncodeFailure { .. } | Error::Tool { .. } => 5,
            Error::Cancelled => 130,
        }
    }

    /// Whether this error was raised before any encode job launched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidProfile(_)
                | Error::InvalidRequest(_)
                | Error::EmptySelection
                | Error::SourceNotFound { .. }
                | Error::Validation(_)
        )
    }

    /// Convenience constructor for [`Error::Io`].
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::EncodeFailure`].
    pub fn encode_failure(quality: impl Into<String>, cause: impl fmt::Display) -> Self {
        Error::EncodeFailure {
            quality: quality.into(),
            cause: cause.to_string(),
        }
    }

    /// An [`Error::InvalidRequest`] naming the unknown quality and listing
    /// every valid one.
    pub fn unknown_quality<S: AsRef<str>>(name: &str, valid: &[S]) -> Self {
        let valid: Vec<&str> = valid.iter().map(AsRef::as_ref).collect();
        Error::InvalidRequest(format!(
            "unknown quality '{name}'; valid qualities are: {}",
            valid.join(", ")
        ))
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
