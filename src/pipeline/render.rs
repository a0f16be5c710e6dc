//! Group rendering: ordered assets → validated intermediate PDFs, in parallel.
//!
//! ## Why spawn_blocking?
//!
//! Decoding, resampling, and JPEG re-encoding a group of page scans is pure
//! CPU work. `tokio::task::spawn_blocking` keeps it off the async worker
//! threads; the bounded `buffer_unordered` stream caps how many groups are
//! in flight at once.
//!
//! ## Ordering
//!
//! Completion order is explicitly meaningless. Every artifact carries the
//! group index assigned at partition time, and the collected results are
//! re-sorted by that index before they reach the merger — never by
//! completion order.

use crate::cache::BoundedCache;
use crate::config::{ConversionConfig, ResizeTarget};
use crate::error::{Comic2PdfError, GroupError};
use crate::pipeline::encode::{write_single_page, GroupPdfWriter};
use crate::pipeline::group::{self, Group, ImageAsset};
use crate::pipeline::merge::validate_pdf_file;
use futures::stream::{self, StreamExt};
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An intermediate multi-page PDF produced for one group.
#[derive(Debug, Clone)]
pub struct TempArtifact {
    pub path: PathBuf,
    /// Back-reference to the group that produced this artifact; the only
    /// reordering key used by the merger.
    pub group_index: usize,
    pub page_count: usize,
}

/// What the render stage hands back to the orchestrator.
#[derive(Debug)]
pub struct RenderOutcome {
    /// Validated artifacts, sorted by group index. May be shorter than
    /// `total_groups`: missing entries are failed groups.
    pub artifacts: Vec<TempArtifact>,
    pub total_groups: usize,
    /// Unique image count after the defensive dedup pass.
    pub unique_images: usize,
}

/// Minimum groups that must succeed for the given ratio.
///
/// Never below one; the epsilon guards against ratios whose f64
/// representation rounds up on exact multiples.
pub fn required_successes(total_groups: usize, ratio: f64) -> usize {
    (((total_groups as f64 * ratio) - 1e-9).ceil() as usize).max(1)
}

/// Render every group of `assets` into intermediate PDFs under `work_dir`.
///
/// Applies the defensive dedup pass, the ordering policy, the group-sizing
/// heuristic, then dispatches groups to the bounded worker pool and gates on
/// the configured success ratio.
///
/// # Errors
/// [`Comic2PdfError::InsufficientSuccessRate`] when too few groups rendered;
/// [`Comic2PdfError::InvalidConfig`] when a custom order does not fit.
pub async fn render_groups(
    assets: Vec<ImageAsset>,
    config: &ConversionConfig,
    work_dir: &Path,
) -> Result<RenderOutcome, Comic2PdfError> {
    let assets = group::dedup_assets(assets);
    let unique_images = assets.len();
    let assets = group::order_assets(assets, &config.merge_order)?;

    if assets.is_empty() {
        return Ok(RenderOutcome {
            artifacts: Vec::new(),
            total_groups: 0,
            unique_images: 0,
        });
    }

    let group_size = group::group_size_for(unique_images, config.speed, config.workers);
    let groups = group::partition(assets, group_size);
    let total_groups = groups.len();
    info!(
        "Partitioned {} image(s) into {} group(s) of up to {}",
        unique_images, total_groups, group_size
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_render_start(unique_images, total_groups);
    }

    let image_cache: Arc<BoundedCache<PathBuf, DynamicImage>> =
        Arc::new(BoundedCache::new(config.image_cache_capacity));

    let results: Vec<Result<TempArtifact, GroupError>> =
        stream::iter(groups.into_iter().map(|g| {
            let config = config.clone();
            let cache = Arc::clone(&image_cache);
            let work_dir = work_dir.to_path_buf();
            async move {
                let result = render_group(g, &config, cache, &work_dir).await;
                if let Some(ref cb) = config.progress_callback {
                    match &result {
                        Ok(a) => cb.on_group_complete(a.group_index, total_groups),
                        Err(e) => cb.on_group_error(e.group_index(), total_groups, &e.to_string()),
                    }
                }
                result
            }
        }))
        .buffer_unordered(config.workers)
        .collect()
        .await;

    let mut artifacts = Vec::new();
    for result in results {
        match result {
            Ok(artifact) => artifacts.push(artifact),
            Err(e) => warn!("{}", e),
        }
    }

    let required = required_successes(total_groups, config.min_success_ratio);
    info!(
        "Render complete: {}/{} group(s) succeeded (gate requires {})",
        artifacts.len(),
        total_groups,
        required
    );
    if artifacts.len() < required {
        return Err(Comic2PdfError::InsufficientSuccessRate {
            succeeded: artifacts.len(),
            total: total_groups,
            required,
        });
    }

    // Completion order is not page order.
    artifacts.sort_by_key(|a| a.group_index);
    Ok(RenderOutcome {
        artifacts,
        total_groups,
        unique_images,
    })
}

/// Render one group on the blocking pool.
async fn render_group(
    group: Group,
    config: &ConversionConfig,
    cache: Arc<BoundedCache<PathBuf, DynamicImage>>,
    work_dir: &Path,
) -> Result<TempArtifact, GroupError> {
    let index = group.index;
    let grayscale = config.grayscale;
    let resize = config.resize;
    let quality = config.jpeg_quality;
    let work_dir = work_dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        render_group_blocking(group, grayscale, resize, quality, cache, &work_dir)
    })
    .await
    .map_err(|e| GroupError::EncodeFailed {
        group: index,
        detail: format!("render task panicked: {e}"),
    })?
}

/// Blocking implementation: validate assets, decode, transform, encode,
/// validate the written artifact.
fn render_group_blocking(
    group: Group,
    grayscale: bool,
    resize: Option<ResizeTarget>,
    jpeg_quality: u8,
    cache: Arc<BoundedCache<PathBuf, DynamicImage>>,
    work_dir: &Path,
) -> Result<TempArtifact, GroupError> {
    let index = group.index;

    // Drop assets that vanished or are empty on disk; only a fully-invalid
    // group fails.
    let valid: Vec<&ImageAsset> = group
        .assets
        .iter()
        .filter(|a| match std::fs::metadata(&a.path) {
            Ok(m) if m.len() > 0 => true,
            _ => {
                warn!("Group {}: missing or empty image '{}'", index, a.path.display());
                false
            }
        })
        .collect();
    if valid.is_empty() {
        return Err(GroupError::NoValidImages { group: index });
    }

    let mut pages: Vec<Arc<DynamicImage>> = Vec::with_capacity(valid.len());
    for asset in valid {
        if let Some(cached) = cache.get(&asset.path) {
            debug!("Image cache hit: {}", asset.path.display());
            pages.push(cached);
            continue;
        }
        match image::open(&asset.path) {
            Ok(decoded) => {
                let transformed = apply_image_options(decoded, grayscale, resize);
                pages.push(cache.insert(asset.path.clone(), transformed));
            }
            Err(e) => warn!(
                "Group {}: skipping undecodable image '{}': {}",
                index,
                asset.path.display(),
                e
            ),
        }
    }
    if pages.is_empty() {
        return Err(GroupError::NoValidImages { group: index });
    }

    let path = work_dir.join(format!("group_{index:04}.pdf"));
    let page_count = if pages.len() == 1 {
        write_single_page(&pages[0], jpeg_quality, &path)
    } else {
        let mut writer = GroupPdfWriter::new(jpeg_quality);
        for img in &pages {
            if let Err(e) = writer.append_page(img) {
                return Err(GroupError::EncodeFailed {
                    group: index,
                    detail: e.to_string(),
                });
            }
        }
        writer.save(&path)
    }
    .map_err(|e| GroupError::EncodeFailed {
        group: index,
        detail: e.to_string(),
    })?;

    validate_pdf_file(&path, true).map_err(|reason| GroupError::ValidationFailed {
        group: index,
        reason,
    })?;

    debug!("Group {} rendered: {} page(s) → {}", index, page_count, path.display());
    Ok(TempArtifact {
        path,
        group_index: index,
        page_count,
    })
}

/// Normalise to RGB, then apply grayscale and the proportional resize.
///
/// The resize fits inside the target box and never upscales: a source
/// already within bounds passes through untouched.
fn apply_image_options(
    img: DynamicImage,
    grayscale: bool,
    resize: Option<ResizeTarget>,
) -> DynamicImage {
    let mut img = DynamicImage::ImageRgb8(img.to_rgb8());

    if grayscale {
        img = DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(img.to_luma8()).to_rgb8());
    }

    if let Some(target) = resize {
        let (max_w, max_h) = target.bounds();
        if img.width() > max_w || img.height() > max_h {
            img = img.resize(max_w, max_h, FilterType::Lanczos3);
        }
    }

    img
}
