//! Error types for the comic2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Comic2PdfError`] — **Fatal**: the conversion cannot proceed at all
//!   (missing archive, unsupported format, too few groups rendered, merge
//!   produced nothing). Returned as `Err(Comic2PdfError)` from the top-level
//!   `convert*` functions.
//!
//! * [`GroupError`] — **Non-fatal**: a single group of pages failed (every
//!   image in it was unreadable, the intermediate PDF failed validation) but
//!   other groups are fine. Group failures are absorbed by the render
//!   coordinator and only become fatal collectively, through the
//!   success-rate gate.
//!
//! The separation lets the pipeline skip broken pages without losing the
//! whole book, while still refusing to emit an output that is mostly holes.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the comic2pdf library.
///
/// Per-group failures use [`GroupError`] and are counted against the
/// success-rate gate rather than propagated here.
#[derive(Debug, Error)]
pub enum Comic2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source archive was not found at the given path.
    #[error("Archive not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the archive.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file extension is outside the supported set.
    #[error(
        "Unrecognized archive extension for '{path}'\nSupported inputs: .cbz, .zip, .cbr, .rar (.epub is recognized but not implemented)."
    )]
    UnknownFormat { path: PathBuf },

    /// The format is recognized but has no conversion implementation.
    #[error("EPUB conversion is not implemented — convert CBZ or CBR archives instead")]
    UnsupportedFormat,

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Both extraction strategies failed, or the archive held no images.
    #[error("No images extracted from '{path}'")]
    NoImagesExtracted { path: PathBuf },

    /// Fewer groups rendered successfully than the gate requires.
    #[error(
        "Insufficient group success rate: {succeeded}/{total} groups rendered (need at least {required})"
    )]
    InsufficientSuccessRate {
        succeeded: usize,
        total: usize,
        required: usize,
    },

    /// Every intermediate document was invalid, so nothing could be merged.
    #[error("Merge produced no valid pages")]
    NoValidArtifacts,

    /// The merged file exists but failed post-write validation.
    #[error("Output failed validation: '{path}': {reason}")]
    OutputValidationFailed { path: PathBuf, reason: String },

    /// Could not create or write the output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed, or options don't fit the archive
    /// (e.g. a custom page order with the wrong length).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page group.
///
/// Produced by the per-group renderer; collected by the coordinator and
/// weighed against the success-rate gate. The overall conversion continues
/// unless too many groups fail.
#[derive(Debug, Clone, Error)]
pub enum GroupError {
    /// Every image in the group was missing, empty, or undecodable.
    #[error("Group {group}: no valid images")]
    NoValidImages { group: usize },

    /// Encoding the group into an intermediate PDF failed.
    #[error("Group {group}: PDF encoding failed: {detail}")]
    EncodeFailed { group: usize, detail: String },

    /// The written intermediate PDF failed its post-write checks.
    #[error("Group {group}: artifact validation failed: {reason}")]
    ValidationFailed { group: usize, reason: String },
}

impl GroupError {
    /// The index of the group this error belongs to.
    pub fn group_index(&self) -> usize {
        match self {
            GroupError::NoValidImages { group }
            | GroupError::EncodeFailed { group, .. }
            | GroupError::ValidationFailed { group, .. } => *group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_success_rate_display() {
        let e = Comic2PdfError::InsufficientSuccessRate {
            succeeded: 1,
            total: 6,
            required: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/6"), "got: {msg}");
        assert!(msg.contains("at least 2"), "got: {msg}");
    }

    #[test]
    fn unsupported_format_mentions_not_implemented() {
        let msg = Comic2PdfError::UnsupportedFormat.to_string();
        assert!(msg.contains("not implemented"), "got: {msg}");
        assert!(msg.contains("CBZ"), "got: {msg}");
    }

    #[test]
    fn no_images_display() {
        let e = Comic2PdfError::NoImagesExtracted {
            path: PathBuf::from("vol1.cbz"),
        };
        assert!(e.to_string().contains("No images extracted"));
        assert!(e.to_string().contains("vol1.cbz"));
    }

    #[test]
    fn group_error_index() {
        let e = GroupError::EncodeFailed {
            group: 7,
            detail: "boom".into(),
        };
        assert_eq!(e.group_index(), 7);
        assert!(e.to_string().contains("Group 7"));
    }
}
