//! Input resolution: classify the source archive and validate access.
//!
//! The format tag is a closed enum so the orchestrator's dispatch is
//! exhaustive — adding a fourth container format is a compile-time-checked
//! change, not a string comparison scattered across the pipeline.

use crate::error::Comic2PdfError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The closed set of recognized source container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Zip-based comic archive (`.cbz`, `.zip`).
    Cbz,
    /// Rar-based comic archive (`.cbr`, `.rar`).
    Cbr,
    /// Recognized but unimplemented — conversion returns a fixed
    /// "not implemented" result without touching the filesystem.
    Epub,
}

impl ArchiveFormat {
    /// Classify a path by its extension (case-insensitive).
    ///
    /// Returns `None` for extensions outside the closed set.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "cbz" | "zip" => Some(ArchiveFormat::Cbz),
            "cbr" | "rar" => Some(ArchiveFormat::Cbr),
            "epub" => Some(ArchiveFormat::Epub),
            _ => None,
        }
    }
}

/// A validated source archive: path plus format tag. Read-only input.
#[derive(Debug, Clone)]
pub struct SourceArchive {
    pub path: PathBuf,
    pub format: ArchiveFormat,
}

/// Classify and validate the source path.
///
/// The EPUB tag is returned *without* any filesystem access so the
/// unsupported-format result stays side-effect free; for the implemented
/// formats the file must exist and be openable.
pub fn resolve_source(path: &Path) -> Result<SourceArchive, Comic2PdfError> {
    let format = ArchiveFormat::from_path(path).ok_or_else(|| Comic2PdfError::UnknownFormat {
        path: path.to_path_buf(),
    })?;

    if format == ArchiveFormat::Epub {
        return Ok(SourceArchive {
            path: path.to_path_buf(),
            format,
        });
    }

    if !path.exists() {
        return Err(Comic2PdfError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    // Check read permission by attempting to open.
    match std::fs::File::open(path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Comic2PdfError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Comic2PdfError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Resolved source archive: {} ({:?})", path.display(), format);
    Ok(SourceArchive {
        path: path.to_path_buf(),
        format,
    })
}
