//! Conversion entry points: extract → render → merge → cleanup, per archive.
//!
//! The orchestrator owns the per-run work directory and the stage
//! sequencing; each stage reports a typed result and nothing escapes
//! [`convert_report`] as an error. There is no retry loop anywhere — each
//! stage runs once, and partial failures are skipped units, not re-attempts.

use crate::config::ConversionConfig;
use crate::error::Comic2PdfError;
use crate::output::{ConversionOutput, ConversionReport, ConversionStats};
use crate::pipeline::extract::extract_images;
use crate::pipeline::input::{resolve_source, ArchiveFormat};
use crate::pipeline::{merge, render};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Convert an archive, deriving the output path from the input.
///
/// See [`default_output_path`] for the derivation rules.
///
/// # Errors
/// Returns `Err(Comic2PdfError)` for every failure class — unsupported
/// format, no images, gate failure, merge failure. Callers that prefer a
/// `(success, message)` surface use [`convert_report`].
pub async fn convert(
    source: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Comic2PdfError> {
    let source = source.as_ref();
    let output = default_output_path(source);
    convert_to(source, output, config).await
}

/// Convert an archive to an explicit output path.
pub async fn convert_to(
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Comic2PdfError> {
    let source = source.as_ref();
    let output = output.as_ref();
    let total_start = Instant::now();

    let src = resolve_source(source)?;
    match src.format {
        // Fixed result, before any filesystem access.
        ArchiveFormat::Epub => return Err(Comic2PdfError::UnsupportedFormat),
        ArchiveFormat::Cbz | ArchiveFormat::Cbr => {}
    }
    info!("Starting conversion: {} → {}", source.display(), output.display());

    // Per-run work directory under the process temp root. The guard removes
    // the whole tree on drop, success or failure; explicit cleanup below
    // handles the bulky files early.
    let temp_root = config
        .temp_root
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("comic2pdf"));
    std::fs::create_dir_all(&temp_root)
        .map_err(|e| Comic2PdfError::Internal(format!("cannot create temp root: {e}")))?;
    let work_dir = tempfile::Builder::new()
        .prefix("run-")
        .tempdir_in(&temp_root)
        .map_err(|e| Comic2PdfError::Internal(format!("cannot create work directory: {e}")))?;

    // ── Extract ──────────────────────────────────────────────────────────
    let extract_start = Instant::now();
    let assets = extract_images(
        src.format,
        &src.path,
        work_dir.path(),
        config.extract_timeout_secs,
    )
    .await;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    let extracted_images = assets.len();
    if assets.is_empty() {
        return Err(Comic2PdfError::NoImagesExtracted {
            path: source.to_path_buf(),
        });
    }
    let asset_paths: Vec<PathBuf> = assets.iter().map(|a| a.path.clone()).collect();

    // ── Render + gate ────────────────────────────────────────────────────
    let render_start = Instant::now();
    let rendered = match render::render_groups(assets, config, work_dir.path()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // Gate failed (or the options didn't fit): surviving artifacts
            // are discarded along with the extracted images.
            merge::cleanup_files(asset_paths).await;
            return Err(e);
        }
    };
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    let succeeded_groups = rendered.artifacts.len();

    // ── Merge ────────────────────────────────────────────────────────────
    let merge_start = Instant::now();
    let artifact_paths: Vec<PathBuf> = rendered.artifacts.iter().map(|a| a.path.clone()).collect();
    let merge_result =
        merge::merge_artifacts(rendered.artifacts, output, config.merge_strategy).await;
    let merge_duration_ms = merge_start.elapsed().as_millis() as u64;

    // ── Cleanup, regardless of merge outcome ─────────────────────────────
    let mut leftovers = asset_paths;
    leftovers.extend(artifact_paths);
    merge::cleanup_files(leftovers).await;

    let merged = merge_result?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_merge_complete(merged.pages);
    }

    let stats = ConversionStats {
        extracted_images,
        unique_images: rendered.unique_images,
        group_count: rendered.total_groups,
        succeeded_groups,
        failed_groups: rendered.total_groups - succeeded_groups,
        merged_pages: merged.pages,
        extract_duration_ms,
        render_duration_ms,
        merge_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {} page(s) in {}ms → {}",
        merged.pages, stats.total_duration_ms, output.display()
    );

    Ok(ConversionOutput {
        output_path: output.to_path_buf(),
        images: rendered.unique_images,
        pages: merged.pages,
        strategy: merged.strategy,
        stats,
    })
}

/// The `(success, message)` surface for callers that don't want typed
/// errors: every failure folds into the report.
pub async fn convert_report(
    source: impl AsRef<Path>,
    output: Option<&Path>,
    config: &ConversionConfig,
) -> ConversionReport {
    let result = match output {
        Some(out) => convert_to(source, out, config).await,
        None => convert(source, config).await,
    };
    match result {
        Ok(output) => ConversionReport::ok(output),
        Err(e) => {
            warn!("Conversion failed: {}", e);
            ConversionReport::failed(&e)
        }
    }
}

/// Synchronous wrapper around [`convert_to`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Comic2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Comic2PdfError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert_to(source, output, config))
}

/// Derive an output path when the caller didn't supply one.
///
/// Preference order: the source's own directory when it already sits inside
/// a `mangas` library folder; otherwise `<Documents>/mangas/` when that
/// directory exists; otherwise next to the source. Always `<stem>.pdf`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let file_name = format!(
        "{}.pdf",
        input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string())
    );
    let parent = match input.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let inside_library = parent.components().any(|c| {
        matches!(c, Component::Normal(os) if os.to_string_lossy().eq_ignore_ascii_case("mangas"))
    });
    if inside_library {
        return parent.join(file_name);
    }

    if let Some(documents) = dirs::document_dir() {
        let library = documents.join("mangas");
        if library.is_dir() {
            return library.join(file_name);
        }
    }

    parent.join(file_name)
}
