//! Error types for document patching.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a patch run.
///
/// Every variant leaves the target file byte-identical to its pre-call state.
/// A missing file or a missing section is not an error: both route to synthesis.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The document uses structure outside the supported subset.
    #[error("malformed document at line {line}: {reason}")]
    MalformedDocument { line: usize, reason: String },

    /// The entry was found but a declaration cannot be placed safely.
    #[error("ambiguous block at line {line}: {reason}")]
    AmbiguousBlock { line: usize, reason: String },

    /// The configuration cannot describe a valid entry.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The document exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Backup, temp write or rename failed. The target was never written in place.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PatchError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        PatchError::MalformedDocument {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn ambiguous(line: usize, reason: impl Into<String>) -> Self {
        PatchError::AmbiguousBlock {
            line,
            reason: reason.into(),
        }
    }

    /// Short machine-friendly name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            PatchError::MalformedDocument { .. } => "malformed-document",
            PatchError::AmbiguousBlock { .. } => "ambiguous-block",
            PatchError::InvalidConfig(_) => "invalid-config",
            PatchError::ReadFailure { .. } => "read-failure",
            PatchError::WriteFailure { .. } => "write-failure",
        }
    }

    /// True for failures caused by document structure rather than I/O.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PatchError::MalformedDocument { .. } | PatchError::AmbiguousBlock { .. }
        )
    }
}

/// Result type for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;
