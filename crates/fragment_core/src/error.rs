//! Error types for fragment_core operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::fragment::FragmentKind;

/// Core error type for fragment_core operations.
///
/// The variants fall into three groups that callers treat differently:
/// I/O and cancellation errors are local to one fragment (see
/// [`FragmentError::is_recoverable`]); everything else describes malformed
/// state and must abort whatever load or reconstruction produced it.
#[derive(Error, Debug)]
pub enum FragmentError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the content behind a fragment failed.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Path that could not be read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The file behind an image fragment is not a recognizable raster image.
    #[error("not a supported image: {}", path.display())]
    NotAnImage {
        /// Path of the offending file
        path: PathBuf,
    },

    /// A blocking read was interrupted by the user.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// A snapshot lacks a metadata key its variant needs for reconstruction.
    #[error("missing metadata key '{key}' for {variant} reconstruction")]
    MissingMetadata {
        /// Variant being reconstructed
        variant: FragmentKind,
        /// The key that was absent
        key: &'static str,
    },

    /// A snapshot carries a metadata value that cannot be parsed.
    #[error("invalid metadata value '{value}' for key '{key}' in {variant} snapshot")]
    InvalidMetadata {
        /// Variant being reconstructed
        variant: FragmentKind,
        /// The offending key
        key: &'static str,
        /// The raw value found
        value: String,
    },

    /// The variant has no reconstruction rule.
    #[error("unsupported variant for reconstruction: {0}")]
    UnsupportedReconstruction(FragmentKind),

    /// A string is neither a dynamic id nor a content hash.
    #[error("invalid fragment id: {0}")]
    InvalidFragmentId(String),

    /// A content-hash id was required but something else was found.
    #[error("expected a content-hash id, got '{0}'")]
    ExpectedContentHash(String),

    /// A dynamic id was required but something else was found.
    #[error("expected a numeric dynamic id, got '{0}'")]
    ExpectedDynamicId(String),

    /// Recomputed snapshot hash does not match its recorded id.
    #[error("content hash mismatch: expected {expected}, got {actual}")]
    ContentHashMismatch {
        /// The recorded id
        expected: String,
        /// The recomputed hash
        actual: String,
    },

    /// A persisted reference names an id present in no record pool.
    #[error("dangling fragment reference: {0}")]
    DanglingReference(String),

    /// A persisted reference resolved to a fragment of the wrong kind.
    #[error("fragment {id} is referenced as {expected} but resolved to {found}")]
    InconsistentReference {
        /// The referenced id
        id: String,
        /// What the reference site requires
        expected: &'static str,
        /// What the id actually resolved to
        found: String,
    },

    /// A persisted record is structurally invalid.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Session document version is not understood.
    #[error("unsupported session document version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the document
        found: u32,
        /// Highest supported version
        supported: u32,
    },

    /// Serialization error while writing records.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error while reading records.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl FragmentError {
    /// True for errors that only concern a single fragment.
    ///
    /// A caller freezing a batch drops the failing fragment and continues;
    /// any other error must abort the operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Read { .. } | Self::NotAnImage { .. } | Self::Cancelled(_)
        )
    }

    /// True if the error is a cancellation rather than an I/O failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Read { .. } | Self::NotAnImage { .. } => {
                Some("The file may have been moved or deleted; remove the fragment from the context.")
            }
            Self::ContentHashMismatch { .. } => {
                Some("The session document was modified or corrupted. Run 'ctxfrag verify' to list affected records.")
            }
            Self::DanglingReference(_) | Self::InconsistentReference { .. } => {
                Some("The session document is inconsistent; restore it from a backup.")
            }
            Self::UnsupportedVersion { .. } => {
                Some("The document was written by a newer release; upgrade ctxfrag.")
            }
            Self::UnsupportedReconstruction(_) => {
                Some("Content-fixed fragments stay frozen; use the snapshot directly.")
            }
            _ => None,
        }
    }
}

/// Convenience Result type for fragment_core operations.
pub type Result<T> = std::result::Result<T, FragmentError>;
