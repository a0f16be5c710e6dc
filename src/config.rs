//! Configuration types for archive-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across workers, log them, and diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::Comic2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for one archive conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use comic2pdf::{ConversionConfig, SpeedMode};
///
/// let config = ConversionConfig::builder()
///     .grayscale(true)
///     .speed(SpeedMode::Fast)
///     .workers(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Convert every page to grayscale before encoding. Default: false.
    pub grayscale: bool,

    /// Optional resize target. Default: None (pages keep source dimensions).
    ///
    /// Resizing is a proportional fit inside the target's pixel bounding box
    /// and never upscales past the source image — a 400 px-wide scan stays
    /// 400 px wide even against an A3 target.
    pub resize: Option<ResizeTarget>,

    /// Page ordering policy applied once, before grouping. Default: Natural.
    pub merge_order: MergeOrder,

    /// Speed/quality trade-off controlling the base group size. Default: Normal.
    ///
    /// Larger groups mean fewer intermediate PDFs (less per-file overhead)
    /// but coarser failure units: when one group fails, all of its pages are
    /// lost together.
    pub speed: SpeedMode,

    /// Number of groups rendered concurrently. Default: 5.
    ///
    /// Rendering is CPU- and memory-bound (decode + JPEG re-encode per page).
    /// Going past the physical core count mostly inflates peak memory.
    pub workers: usize,

    /// Minimum fraction of groups that must render successfully before a
    /// merge is attempted. Default: 1/3.
    ///
    /// The gate requires `succeeded >= ceil(total * min_success_ratio)`
    /// (never less than one group). Below the threshold the run fails
    /// without producing an output file.
    pub min_success_ratio: f64,

    /// Timeout for the external `unar` extraction tool in seconds. Default: 60.
    ///
    /// On timeout or failure, extraction falls back to the in-process reader.
    pub extract_timeout_secs: u64,

    /// JPEG quality for encoded pages, 1–100. Default: 85.
    pub jpeg_quality: u8,

    /// How intermediate documents are combined. Default: Structural.
    pub merge_strategy: MergeStrategy,

    /// Capacity of the shared decoded-image cache. Default: 50.
    ///
    /// Decoded pages are large; the cache is bounded LRU so repeated paths
    /// within a run are decoded once without memory growing with the archive.
    pub image_cache_capacity: usize,

    /// Root directory for per-run work directories.
    /// Default: None (`std::env::temp_dir()/comic2pdf`).
    pub temp_root: Option<PathBuf>,

    /// Optional per-group progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            grayscale: false,
            resize: None,
            merge_order: MergeOrder::Natural,
            speed: SpeedMode::Normal,
            workers: 5,
            min_success_ratio: 1.0 / 3.0,
            extract_timeout_secs: 60,
            jpeg_quality: 85,
            merge_strategy: MergeStrategy::Structural,
            image_cache_capacity: 50,
            temp_root: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("grayscale", &self.grayscale)
            .field("resize", &self.resize)
            .field("merge_order", &self.merge_order)
            .field("speed", &self.speed)
            .field("workers", &self.workers)
            .field("min_success_ratio", &self.min_success_ratio)
            .field("extract_timeout_secs", &self.extract_timeout_secs)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("merge_strategy", &self.merge_strategy)
            .field("image_cache_capacity", &self.image_cache_capacity)
            .field("temp_root", &self.temp_root)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn grayscale(mut self, v: bool) -> Self {
        self.config.grayscale = v;
        self
    }

    pub fn resize(mut self, target: ResizeTarget) -> Self {
        self.config.resize = Some(target);
        self
    }

    pub fn merge_order(mut self, order: MergeOrder) -> Self {
        self.config.merge_order = order;
        self
    }

    pub fn speed(mut self, mode: SpeedMode) -> Self {
        self.config.speed = mode;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn min_success_ratio(mut self, ratio: f64) -> Self {
        self.config.min_success_ratio = ratio.clamp(f64::EPSILON, 1.0);
        self
    }

    pub fn extract_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extract_timeout_secs = secs.max(1);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.config.merge_strategy = strategy;
        self
    }

    pub fn image_cache_capacity(mut self, n: usize) -> Self {
        self.config.image_cache_capacity = n.max(1);
        self
    }

    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.temp_root = Some(root.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Comic2PdfError> {
        let c = &self.config;
        if c.workers == 0 {
            return Err(Comic2PdfError::InvalidConfig("workers must be >= 1".into()));
        }
        if !(c.min_success_ratio > 0.0 && c.min_success_ratio <= 1.0) {
            return Err(Comic2PdfError::InvalidConfig(format!(
                "min_success_ratio must be in (0, 1], got {}",
                c.min_success_ratio
            )));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(Comic2PdfError::InvalidConfig(format!(
                "jpeg_quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if let MergeOrder::Custom(ref order) = c.merge_order {
            if order.is_empty() {
                return Err(Comic2PdfError::InvalidConfig(
                    "custom merge order must not be empty".into(),
                ));
            }
            let mut seen = vec![false; order.len()];
            for &idx in order {
                if idx >= order.len() || seen[idx] {
                    return Err(Comic2PdfError::InvalidConfig(format!(
                        "custom merge order must be a permutation of 0..{}, got index {}",
                        order.len(),
                        idx
                    )));
                }
                seen[idx] = true;
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Speed/quality trade-off for group sizing.
///
/// Faster modes pack more images per intermediate PDF, cutting per-file
/// overhead at the cost of coarser failure granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeedMode {
    /// 25 images per group. (default)
    #[default]
    Normal,
    /// 40 images per group.
    Fast,
    /// 60 images per group.
    VeryFast,
}

impl SpeedMode {
    /// Base group size before worker/total adjustments.
    pub fn base_group_size(self) -> usize {
        match self {
            SpeedMode::Normal => 25,
            SpeedMode::Fast => 40,
            SpeedMode::VeryFast => 60,
        }
    }
}

/// Page ordering policy, applied once to the naturally-sorted asset list
/// before grouping. Grouping never re-sorts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeOrder {
    /// Natural sort: digit runs compared as integers, text case-insensitively,
    /// so `page2` sorts before `page10`. (default)
    #[default]
    Natural,
    /// Re-sort by file name only, lowercased, strictly lexicographic.
    Alphabetical,
    /// Reverse of the natural order.
    Reversed,
    /// Explicit permutation of the naturally-sorted list: entry `i` of the
    /// vector names which natural-order page comes `i`-th in the output.
    /// The vector length must equal the archive's unique image count.
    Custom(Vec<usize>),
}

/// Named pixel bounding boxes for proportional page resizing.
///
/// Paper sizes are at 72 dpi; screen sizes are the usual display
/// resolutions. The fit preserves aspect ratio and never upscales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeTarget {
    A4,
    Letter,
    A3,
    A5,
    Hd,
    Fhd,
}

impl ResizeTarget {
    /// Target bounding box in pixels, `(width, height)`.
    pub fn bounds(self) -> (u32, u32) {
        match self {
            ResizeTarget::A4 => (595, 842),
            ResizeTarget::Letter => (612, 792),
            ResizeTarget::A3 => (842, 1191),
            ResizeTarget::A5 => (420, 595),
            ResizeTarget::Hd => (1280, 720),
            ResizeTarget::Fhd => (1920, 1080),
        }
    }
}

/// How validated intermediate documents become the final output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Read every intermediate and re-write all pages, in group order, into
    /// one document. (default)
    #[default]
    Structural,
    /// Copy the single largest validated intermediate verbatim. Lossy: only
    /// that one group's pages survive. Used directly when selected, or as an
    /// automatic fallback when the structural merge errors.
    LargestArtifact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let c = ConversionConfig::builder().build().unwrap();
        assert_eq!(c.workers, 5);
        assert_eq!(c.speed, SpeedMode::Normal);
        assert!((c.min_success_ratio - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn workers_clamped_to_one() {
        let c = ConversionConfig::builder().workers(0).build().unwrap();
        assert_eq!(c.workers, 1);
    }

    #[test]
    fn jpeg_quality_clamped() {
        let c = ConversionConfig::builder().jpeg_quality(0).build().unwrap();
        assert_eq!(c.jpeg_quality, 1);
        let c = ConversionConfig::builder().jpeg_quality(255).build().unwrap();
        assert_eq!(c.jpeg_quality, 100);
    }

    #[test]
    fn custom_order_must_be_permutation() {
        // Duplicate index
        let err = ConversionConfig::builder()
            .merge_order(MergeOrder::Custom(vec![0, 0, 1]))
            .build();
        assert!(matches!(err, Err(Comic2PdfError::InvalidConfig(_))));

        // Out-of-range index
        let err = ConversionConfig::builder()
            .merge_order(MergeOrder::Custom(vec![0, 3, 1]))
            .build();
        assert!(matches!(err, Err(Comic2PdfError::InvalidConfig(_))));

        // Valid permutation
        assert!(ConversionConfig::builder()
            .merge_order(MergeOrder::Custom(vec![2, 0, 1]))
            .build()
            .is_ok());
    }

    #[test]
    fn speed_mode_base_sizes() {
        assert_eq!(SpeedMode::Normal.base_group_size(), 25);
        assert_eq!(SpeedMode::Fast.base_group_size(), 40);
        assert_eq!(SpeedMode::VeryFast.base_group_size(), 60);
    }

    #[test]
    fn resize_bounds() {
        assert_eq!(ResizeTarget::A4.bounds(), (595, 842));
        assert_eq!(ResizeTarget::Fhd.bounds(), (1920, 1080));
    }
}
