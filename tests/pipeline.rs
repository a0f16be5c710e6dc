//! End-to-end tests for the conversion pipeline.
//!
//! Every test builds a synthetic archive on the fly (zip writer + generated
//! PNGs), runs the real pipeline against it, and inspects the produced PDF
//! with lopdf. No network access and no external binaries are required: CBR
//! inputs are exercised through the in-process fallback path.

use comic2pdf::{
    convert_report, convert_to, Comic2PdfError, ConversionConfig, MergeOrder, MergeStrategy,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// A solid-colour PNG; width doubles as an order marker observable in the
/// output PDF's MediaBox.
fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 60, 30])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn write_archive(path: &Path, entries: &[(String, Vec<u8>)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zw = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    for (name, data) in entries {
        zw.start_file(name.clone(), options).unwrap();
        zw.write_all(data).unwrap();
    }
    zw.finish().unwrap();
}

/// Page widths (in points) of a PDF, in page order.
fn page_widths(path: &Path) -> Vec<f32> {
    let doc = lopdf::Document::load(path).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| {
            let page = doc.get_dictionary(id).unwrap();
            match page.get(b"MediaBox").unwrap() {
                lopdf::Object::Array(arr) => match &arr[2] {
                    lopdf::Object::Real(w) => *w,
                    lopdf::Object::Integer(w) => *w as f32,
                    _ => panic!("unexpected MediaBox entry"),
                },
                _ => panic!("MediaBox is not an array"),
            }
        })
        .collect()
}

fn page_count(path: &Path) -> usize {
    lopdf::Document::load(path).unwrap().get_pages().len()
}

/// Pixel width → page width in points, matching the fixed 100-dpi scale.
fn points(px: u32) -> f32 {
    px as f32 * 72.0 / 100.0
}

/// Compare page widths with a tolerance: Real values round-trip through the
/// PDF's decimal serialization.
fn assert_widths_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "page count mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < 0.01, "page {i}: got {a}, expected {e}");
    }
}

struct TestRun {
    _dir: tempfile::TempDir,
    archive: PathBuf,
    output: PathBuf,
    temp_root: PathBuf,
}

/// Lay out an archive, an output location, and a contained temp root.
fn test_run(archive_name: &str, entries: &[(String, Vec<u8>)]) -> TestRun {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join(archive_name);
    write_archive(&archive, entries);
    let output = dir.path().join("out").join("result.pdf");
    let temp_root = dir.path().join("tmp");
    TestRun {
        archive,
        output,
        temp_root,
        _dir: dir,
    }
}

fn config_for(run: &TestRun, workers: usize) -> ConversionConfig {
    ConversionConfig::builder()
        .workers(workers)
        .temp_root(&run.temp_root)
        .build()
        .unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn five_page_archive_single_worker() {
    let entries: Vec<(String, Vec<u8>)> = (1..=5)
        .map(|i| (format!("page{i}.png"), png_bytes(80, 120)))
        .collect();
    let run = test_run("vol1.cbz", &entries);

    let output = convert_to(&run.archive, &run.output, &config_for(&run, 1))
        .await
        .unwrap();

    assert_eq!(output.images, 5);
    assert_eq!(output.pages, 5);
    assert_eq!(output.stats.group_count, 1);
    assert_eq!(output.strategy, MergeStrategy::Structural);
    assert_eq!(page_count(&run.output), 5);

    // The per-run work directory is gone; only bookkeeping dirs remain.
    let leftover: Vec<_> = std::fs::read_dir(&run.temp_root).unwrap().collect();
    assert!(leftover.is_empty(), "work dir not cleaned up: {leftover:?}");
}

#[tokio::test]
async fn page_order_is_independent_of_worker_count() {
    // Widths encode the natural page order; four workers → three groups
    // completing in whatever order they like.
    let entries: Vec<(String, Vec<u8>)> = (1..=30)
        .map(|i| (format!("page{i}.png"), png_bytes(100 + i, 200)))
        .collect();
    let run = test_run("vol1.cbz", &entries);

    let output = convert_to(&run.archive, &run.output, &config_for(&run, 4))
        .await
        .unwrap();

    assert_eq!(output.pages, 30);
    assert_eq!(output.stats.group_count, 3);
    let expected: Vec<f32> = (1..=30).map(|i| points(100 + i)).collect();
    assert_widths_close(&page_widths(&run.output), &expected);
}

#[tokio::test]
async fn reversed_order_reverses_pages() {
    let entries: Vec<(String, Vec<u8>)> = (1..=12)
        .map(|i| (format!("page{i}.png"), png_bytes(100 + i, 200)))
        .collect();
    let run = test_run("vol1.cbz", &entries);

    let config = ConversionConfig::builder()
        .workers(2)
        .merge_order(MergeOrder::Reversed)
        .temp_root(&run.temp_root)
        .build()
        .unwrap();
    convert_to(&run.archive, &run.output, &config).await.unwrap();

    let expected: Vec<f32> = (1..=12).rev().map(|i| points(100 + i)).collect();
    assert_widths_close(&page_widths(&run.output), &expected);
}

#[tokio::test]
async fn custom_order_applies_permutation() {
    let entries: Vec<(String, Vec<u8>)> = (1..=3)
        .map(|i| (format!("page{i}.png"), png_bytes(100 + i, 200)))
        .collect();
    let run = test_run("vol1.cbz", &entries);

    let config = ConversionConfig::builder()
        .merge_order(MergeOrder::Custom(vec![2, 0, 1]))
        .temp_root(&run.temp_root)
        .build()
        .unwrap();
    convert_to(&run.archive, &run.output, &config).await.unwrap();

    let expected: Vec<f32> = [3, 1, 2].iter().map(|&i| points(100 + i)).collect();
    assert_widths_close(&page_widths(&run.output), &expected);
}

#[tokio::test]
async fn archive_without_images_reports_failure() {
    let entries = vec![("readme.txt".to_string(), b"no pages here".to_vec())];
    let run = test_run("empty.cbz", &entries);

    let report = convert_report(&run.archive, Some(&run.output), &config_for(&run, 2)).await;

    assert!(!report.success);
    assert!(
        report.message.contains("No images extracted"),
        "{}",
        report.message
    );
    assert!(!run.output.exists());
}

#[tokio::test]
async fn epub_is_rejected_without_filesystem_writes() {
    let dir = tempfile::tempdir().unwrap();
    let book = dir.path().join("book.epub");
    std::fs::write(&book, b"PK\x03\x04 pretend epub").unwrap();
    let output = dir.path().join("out.pdf");
    let temp_root = dir.path().join("tmp");

    let config = ConversionConfig::builder()
        .temp_root(&temp_root)
        .build()
        .unwrap();
    let report = convert_report(&book, Some(&output), &config).await;

    assert!(!report.success);
    assert!(report.message.contains("not implemented"), "{}", report.message);
    assert!(!output.exists());
    // The orchestrator bailed before even creating its temp root.
    assert!(!temp_root.exists());
}

#[tokio::test]
async fn gate_failure_leaves_no_output() {
    // Image-extension entries that no decoder accepts: every group fails.
    let entries: Vec<(String, Vec<u8>)> = (1..=30)
        .map(|i| (format!("page{i:02}.png"), b"definitely not a png".to_vec()))
        .collect();
    let run = test_run("broken.cbz", &entries);

    let err = convert_to(&run.archive, &run.output, &config_for(&run, 4))
        .await
        .unwrap_err();

    match err {
        Comic2PdfError::InsufficientSuccessRate {
            succeeded,
            total,
            required,
        } => {
            assert_eq!(succeeded, 0);
            assert_eq!(total, 3);
            assert_eq!(required, 1);
        }
        other => panic!("expected gate failure, got {other}"),
    }
    assert!(!run.output.exists());
}

#[tokio::test]
async fn single_surviving_group_passes_gate() {
    // Groups of 10: pages 01–10 decode, the rest don't. Exactly one of
    // three groups survives — the gate threshold at the default ratio.
    let entries: Vec<(String, Vec<u8>)> = (1..=30)
        .map(|i| {
            let data = if i <= 10 {
                png_bytes(80, 120)
            } else {
                b"definitely not a png".to_vec()
            };
            (format!("page{i:02}.png"), data)
        })
        .collect();
    let run = test_run("partial.cbz", &entries);

    let output = convert_to(&run.archive, &run.output, &config_for(&run, 4))
        .await
        .unwrap();

    assert_eq!(output.stats.group_count, 3);
    assert_eq!(output.stats.succeeded_groups, 1);
    assert_eq!(output.stats.failed_groups, 2);
    assert_eq!(output.pages, 10);
    assert_eq!(page_count(&run.output), 10);
}

#[tokio::test]
async fn largest_artifact_fallback_is_observably_different() {
    let entries: Vec<(String, Vec<u8>)> = (1..=30)
        .map(|i| (format!("page{i:02}.png"), png_bytes(100, 150)))
        .collect();
    let run = test_run("vol1.cbz", &entries);

    let config = ConversionConfig::builder()
        .workers(4)
        .merge_strategy(MergeStrategy::LargestArtifact)
        .temp_root(&run.temp_root)
        .build()
        .unwrap();
    let report = convert_report(&run.archive, Some(&run.output), &config).await;

    assert!(report.success, "{}", report.message);
    let output = report.output.unwrap();
    assert_eq!(output.strategy, MergeStrategy::LargestArtifact);
    // One group's pages, not the whole book: the degraded copy is lossy and
    // must not look like a real merge.
    assert_eq!(output.stats.group_count, 3);
    assert_eq!(output.pages, 10);
    assert_eq!(page_count(&run.output), 10);
    assert!(report.message.contains("largest-artifact"), "{}", report.message);
}

#[tokio::test]
async fn cbr_input_converts_through_fallback_reader() {
    // Zip bytes behind a .cbr extension: with or without unar installed,
    // the extraction chain lands on the in-process reader and succeeds.
    let entries: Vec<(String, Vec<u8>)> = (1..=5)
        .map(|i| (format!("page{i}.png"), png_bytes(80, 120)))
        .collect();
    let run = test_run("vol1.cbr", &entries);

    let output = convert_to(&run.archive, &run.output, &config_for(&run, 2))
        .await
        .unwrap();
    assert_eq!(output.pages, 5);
}

#[tokio::test]
async fn happy_path_report_message_counts_images() {
    let entries: Vec<(String, Vec<u8>)> = (1..=5)
        .map(|i| (format!("page{i}.png"), png_bytes(80, 120)))
        .collect();
    let run = test_run("vol1.cbz", &entries);

    let report = convert_report(&run.archive, Some(&run.output), &config_for(&run, 1)).await;
    assert!(report.success);
    assert!(
        report.message.contains("Converted 5 images"),
        "{}",
        report.message
    );
}

#[tokio::test]
async fn nested_entries_and_non_images_are_handled() {
    let mut entries: Vec<(String, Vec<u8>)> = (1..=5)
        .map(|i| (format!("chapter1/page{i}.png"), png_bytes(80, 120)))
        .collect();
    entries.push(("ComicInfo.xml".to_string(), b"<ComicInfo/>".to_vec()));
    entries.push(("chapter1/thumbs.db".to_string(), b"junk".to_vec()));
    let run = test_run("vol1.cbz", &entries);

    let output = convert_to(&run.archive, &run.output, &config_for(&run, 2))
        .await
        .unwrap();
    assert_eq!(output.images, 5);
    assert_eq!(output.pages, 5);
}
