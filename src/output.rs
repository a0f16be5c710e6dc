//! Result types returned by the `convert*` entry points.

use crate::config::MergeStrategy;
use serde::Serialize;
use std::path::PathBuf;

/// Successful conversion result.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Where the final PDF was written.
    pub output_path: PathBuf,
    /// Unique images that went into rendering.
    pub images: usize,
    /// Page count of the final document.
    pub pages: usize,
    /// Which merge strategy actually produced the output. A run configured
    /// as [`MergeStrategy::Structural`] reports [`MergeStrategy::LargestArtifact`]
    /// here when the structural merge errored and the degraded copy kicked in.
    pub strategy: MergeStrategy,
    /// Timing and counting details.
    pub stats: ConversionStats,
}

/// Counters and per-stage timings for one conversion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    /// Raw image paths the extractor yielded (before dedup).
    pub extracted_images: usize,
    /// Images remaining after deduplication.
    pub unique_images: usize,
    /// Groups the images were partitioned into.
    pub group_count: usize,
    /// Groups whose intermediate PDF rendered and validated.
    pub succeeded_groups: usize,
    /// Groups skipped due to render or validation failure.
    pub failed_groups: usize,
    /// Pages in the merged output.
    pub merged_pages: usize,
    pub extract_duration_ms: u64,
    pub render_duration_ms: u64,
    pub merge_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The caller-facing `(success, message)` surface.
///
/// [`crate::convert_report`] never returns an error: every failure mode is
/// folded into `success = false` plus a human-readable `message`. Callers
/// that want typed errors use [`crate::convert`] instead.
#[derive(Debug)]
pub struct ConversionReport {
    pub success: bool,
    /// Human-readable outcome, e.g. `Converted 42 images to 'vol1.pdf' (42
    /// pages)` or `No images extracted from 'vol1.cbz'`.
    pub message: String,
    /// Present on success only.
    pub output: Option<ConversionOutput>,
}

impl ConversionReport {
    pub(crate) fn ok(output: ConversionOutput) -> Self {
        let message = match output.strategy {
            MergeStrategy::Structural => format!(
                "Converted {} images to '{}' ({} pages)",
                output.images,
                output.output_path.display(),
                output.pages
            ),
            MergeStrategy::LargestArtifact => format!(
                "Converted {} images to '{}' using the largest-artifact fallback \
                 ({} pages — pages outside the largest group were dropped)",
                output.images,
                output.output_path.display(),
                output.pages
            ),
        };
        Self {
            success: true,
            message,
            output: Some(output),
        }
    }

    pub(crate) fn failed(err: &crate::error::Comic2PdfError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            output: None,
        }
    }
}
