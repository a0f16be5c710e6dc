//! Asset extraction: archive → ordered list of page-image paths on disk.
//!
//! Two strategies exist. The external `unar` tool is the fast path for
//! rar-based archives and runs as a subprocess under a timeout; the
//! in-process zip reader is both the only CBZ path and the CBR fallback
//! (a large share of real-world `.cbr` files are zip archives wearing the
//! wrong extension). Each strategy reports a typed [`StrategyOutcome`] and
//! the chain is composed explicitly — no timeout or error side-channels.
//!
//! This boundary is infallible by contract: total failure yields an empty
//! list, individual entry failures are logged and skipped. The caller tells
//! "archive had no images" apart from "unsupported format" before ever
//! reaching this module.

use crate::pipeline::group::ImageAsset;
use crate::pipeline::input::ArchiveFormat;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions accepted as page images (lowercase).
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Typed result of one extraction strategy.
#[derive(Debug)]
pub enum StrategyOutcome {
    /// Strategy ran and produced these image files on disk.
    Extracted(Vec<PathBuf>),
    /// External tool exceeded the configured timeout.
    Timeout,
    /// Strategy could not extract anything usable.
    Failed(String),
}

/// Does this path carry a page-image extension?
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Extract the archive's page images into a fresh subdirectory of `work_dir`.
///
/// Returns deduplicated paths in the archive's natural enumeration order;
/// sorting policy is the renderer's job. Empty on total failure — no error
/// crosses this boundary.
pub async fn extract_images(
    format: ArchiveFormat,
    archive: &Path,
    work_dir: &Path,
    timeout_secs: u64,
) -> Vec<ImageAsset> {
    // Collision-safe per-extraction directory; the per-run work dir owns its
    // lifetime, so the handle is released immediately.
    let extract_dir = match tempfile::Builder::new()
        .prefix("extract-")
        .tempdir_in(work_dir)
    {
        Ok(d) => d.keep(),
        Err(e) => {
            warn!("Could not create extraction directory: {}", e);
            return Vec::new();
        }
    };
    debug!("Extracting {} into {}", archive.display(), extract_dir.display());

    let outcome = match format {
        ArchiveFormat::Cbz => zip_strategy_blocking(archive, &extract_dir).await,
        ArchiveFormat::Cbr => {
            match unar_strategy(archive, &extract_dir, timeout_secs).await {
                StrategyOutcome::Extracted(files) => StrategyOutcome::Extracted(files),
                StrategyOutcome::Timeout => {
                    warn!("unar timed out after {}s, trying the in-process reader", timeout_secs);
                    zip_strategy_blocking(archive, &extract_dir).await
                }
                StrategyOutcome::Failed(reason) => {
                    warn!("unar unavailable or failed ({}), trying the in-process reader", reason);
                    zip_strategy_blocking(archive, &extract_dir).await
                }
            }
        }
        // The orchestrator short-circuits EPUB before extraction.
        ArchiveFormat::Epub => StrategyOutcome::Failed("unsupported format".into()),
    };

    let paths = match outcome {
        StrategyOutcome::Extracted(paths) => paths,
        StrategyOutcome::Timeout | StrategyOutcome::Failed(_) => Vec::new(),
    };

    // Set semantics on paths; first-seen order preserved.
    let assets = crate::pipeline::group::dedup_assets(
        paths.into_iter().map(ImageAsset::new).collect(),
    );
    info!("Extracted {} unique image(s) from {}", assets.len(), archive.display());
    assets
}

/// External-tool strategy: `unar -o <dir> <archive>` under a timeout.
///
/// A zero exit status is not trusted on its own — at least one file must
/// actually exist on disk afterwards.
async fn unar_strategy(archive: &Path, dest: &Path, timeout_secs: u64) -> StrategyOutcome {
    // kill_on_drop: a timed-out unar must not keep running untracked.
    let run = Command::new("unar")
        .arg("-o")
        .arg(dest)
        .arg(archive)
        .kill_on_drop(true)
        .output();

    let output = match timeout(Duration::from_secs(timeout_secs), run).await {
        Err(_) => return StrategyOutcome::Timeout,
        Ok(Err(e)) => return StrategyOutcome::Failed(format!("failed to run unar: {e}")),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return StrategyOutcome::Failed(format!(
            "unar exited with {}: {}",
            output.status,
            stderr.trim()
        ));
    }

    let produced_any = WalkDir::new(dest)
        .into_iter()
        .filter_map(Result::ok)
        .any(|e| e.file_type().is_file());
    if !produced_any {
        return StrategyOutcome::Failed("unar reported success but produced no files".into());
    }

    StrategyOutcome::Extracted(scan_images(dest))
}

/// In-process strategy on the blocking pool (inflate is CPU-bound).
async fn zip_strategy_blocking(archive: &Path, dest: &Path) -> StrategyOutcome {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    match tokio::task::spawn_blocking(move || zip_strategy(&archive, &dest)).await {
        Ok(outcome) => outcome,
        Err(e) => StrategyOutcome::Failed(format!("extraction task panicked: {e}")),
    }
}

/// Enumerate zip entries, extract only image files, skip broken entries.
fn zip_strategy(archive: &Path, dest: &Path) -> StrategyOutcome {
    let file = match File::open(archive) {
        Ok(f) => f,
        Err(e) => return StrategyOutcome::Failed(format!("cannot open archive: {e}")),
    };
    let mut zip = match zip::ZipArchive::new(BufReader::new(file)) {
        Ok(z) => z,
        Err(e) => return StrategyOutcome::Failed(format!("not a readable zip archive: {e}")),
    };

    debug!("{} entries in archive", zip.len());
    let mut extracted = Vec::new();

    for i in 0..zip.len() {
        let mut entry = match zip.by_index(i) {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry #{}: {}", i, e);
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        // enclosed_name rejects absolute paths and `..` traversal.
        let rel = match entry.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => {
                warn!("Skipping entry with unsafe path: {}", entry.name());
                continue;
            }
        };
        if !is_image_file(&rel) {
            continue;
        }

        let out_path = dest.join(&rel);
        if let Some(parent) = out_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Skipping '{}': cannot create directory: {}", rel.display(), e);
                continue;
            }
        }
        let mut out = match File::create(&out_path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Skipping '{}': cannot create file: {}", rel.display(), e);
                continue;
            }
        };
        match std::io::copy(&mut entry, &mut out) {
            Ok(_) => extracted.push(out_path),
            Err(e) => warn!("Skipping '{}': extraction failed: {}", rel.display(), e),
        }
    }

    if extracted.is_empty() {
        StrategyOutcome::Failed("no image entries could be extracted".into())
    } else {
        debug!("Extracted {} image file(s)", extracted.len());
        StrategyOutcome::Extracted(extracted)
    }
}

/// Recursively collect image files from an extraction directory.
fn scan_images(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_image_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::{Cursor, Write};

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn write_test_cbz(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zw = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        for (name, data) in entries {
            zw.start_file(*name, options).unwrap();
            zw.write_all(data).unwrap();
        }
        zw.finish().unwrap();
    }

    #[test]
    fn image_extension_filter() {
        assert!(is_image_file(Path::new("p1.png")));
        assert!(is_image_file(Path::new("P1.JPG")));
        assert!(is_image_file(Path::new("dir/p1.webp")));
        assert!(!is_image_file(Path::new("info.txt")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[tokio::test]
    async fn cbz_extraction_filters_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let png = png_bytes();
        let cbz = dir.path().join("vol1.cbz");
        write_test_cbz(
            &cbz,
            &[
                ("p1.png", png.as_slice()),
                ("pages/p2.png", png.as_slice()),
                ("info.txt", b"not an image".as_slice()),
                ("thumbs.db", b"junk".as_slice()),
            ],
        );

        let assets = extract_images(ArchiveFormat::Cbz, &cbz, dir.path(), 5).await;
        assert_eq!(assets.len(), 2);
        for asset in &assets {
            assert!(asset.path.exists());
            assert!(is_image_file(&asset.path));
        }
    }

    #[tokio::test]
    async fn archive_without_images_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cbz = dir.path().join("textonly.cbz");
        write_test_cbz(&cbz, &[("readme.txt", b"hello".as_slice())]);

        let assets = extract_images(ArchiveFormat::Cbz, &cbz, dir.path(), 5).await;
        assert!(assets.is_empty());
    }

    #[tokio::test]
    async fn garbage_archive_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("broken.cbz");
        std::fs::write(&junk, b"this is not a zip file at all").unwrap();

        let assets = extract_images(ArchiveFormat::Cbz, &junk, dir.path(), 5).await;
        assert!(assets.is_empty());
    }

    #[tokio::test]
    async fn cbr_falls_back_to_in_process_reader() {
        // A zip archive with a .cbr extension: whether or not unar exists on
        // the machine, the chain must end up extracting the images.
        let dir = tempfile::tempdir().unwrap();
        let png = png_bytes();
        let cbr = dir.path().join("vol1.cbr");
        write_test_cbz(&cbr, &[("p1.png", png.as_slice()), ("p2.png", png.as_slice())]);

        let assets = extract_images(ArchiveFormat::Cbr, &cbr, dir.path(), 10).await;
        assert_eq!(assets.len(), 2);
    }

    #[test]
    fn zip_strategy_rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("junk.cbz");
        std::fs::write(&junk, b"PK but not really").unwrap();

        match zip_strategy(&junk, dir.path()) {
            StrategyOutcome::Failed(_) => {}
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
