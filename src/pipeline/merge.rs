//! Structural merge of intermediate PDFs into the final document.
//!
//! The primary strategy reads every validated intermediate and re-writes
//! all of its pages, in group order, into one output document. The degraded
//! fallback copies the single largest intermediate verbatim — it does not
//! actually merge, which is why the outcome carries the strategy that really
//! ran: callers must be able to tell the two apart.
//!
//! Parsed intermediates are cached process-wide (bounded LRU) keyed by
//! artifact path, so repeat merges within one process don't re-parse.

use crate::cache::BoundedCache;
use crate::config::MergeStrategy;
use crate::error::Comic2PdfError;
use crate::pipeline::render::TempArtifact;
use futures::stream::{self, StreamExt};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Any PDF smaller than this is treated as a failed write.
const MIN_PDF_BYTES: u64 = 1024;
/// The `%%EOF` trailer must appear within this many bytes of the end.
const EOF_WINDOW: usize = 50;
/// Capacity of the process-wide parsed-document cache.
const DOCUMENT_CACHE_CAPACITY: usize = 20;
/// Above this many files, cleanup deletions run concurrently.
const PARALLEL_CLEANUP_THRESHOLD: usize = 10;

static DOCUMENT_CACHE: Lazy<BoundedCache<PathBuf, Document>> =
    Lazy::new(|| BoundedCache::new(DOCUMENT_CACHE_CAPACITY));

/// What the merge stage actually did.
#[derive(Debug, Clone, Copy)]
pub struct MergeOutcome {
    /// Page count of the written output.
    pub pages: usize,
    /// Strategy that produced the output — [`MergeStrategy::LargestArtifact`]
    /// either by configuration or as the automatic fallback.
    pub strategy: MergeStrategy,
}

/// Cheap structural checks on a written PDF.
///
/// Checks existence, a minimum size, and the `%PDF` magic; with
/// `require_eof` also that `%%EOF` appears near the end of the file.
pub fn validate_pdf_file(path: &Path, require_eof: bool) -> Result<(), String> {
    let meta = std::fs::metadata(path).map_err(|e| format!("not accessible: {e}"))?;
    if meta.len() < MIN_PDF_BYTES {
        return Err(format!(
            "file too small ({} bytes, need at least {MIN_PDF_BYTES})",
            meta.len()
        ));
    }

    let mut file = File::open(path).map_err(|e| format!("cannot open: {e}"))?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)
        .map_err(|e| format!("cannot read header: {e}"))?;
    if &magic != b"%PDF" {
        return Err(format!("bad header {magic:?}, expected %PDF"));
    }

    if require_eof {
        let window = EOF_WINDOW.min(meta.len() as usize);
        file.seek(SeekFrom::End(-(window as i64)))
            .map_err(|e| format!("cannot seek: {e}"))?;
        let mut tail = vec![0u8; window];
        file.read_exact(&mut tail)
            .map_err(|e| format!("cannot read trailer: {e}"))?;
        if !tail.windows(5).any(|w| w == b"%%EOF") {
            return Err("missing %%EOF trailer".into());
        }
    }

    Ok(())
}

/// Merge validated artifacts into the final document at `output`.
///
/// Artifacts must already be sorted by group index (the renderer guarantees
/// this). Invalid artifacts are discarded here with a warning; if none
/// survive, the merge fails without writing anything.
pub async fn merge_artifacts(
    artifacts: Vec<TempArtifact>,
    output: &Path,
    strategy: MergeStrategy,
) -> Result<MergeOutcome, Comic2PdfError> {
    // Defensive dedup by path, preserving group order.
    let mut seen = HashSet::new();
    let artifacts: Vec<TempArtifact> = artifacts
        .into_iter()
        .filter(|a| seen.insert(a.path.clone()))
        .collect();

    let valid: Vec<TempArtifact> = artifacts
        .into_iter()
        .filter(|a| match validate_pdf_file(&a.path, false) {
            Ok(()) => true,
            Err(reason) => {
                warn!("Discarding invalid artifact '{}': {}", a.path.display(), reason);
                false
            }
        })
        .collect();
    if valid.is_empty() {
        return Err(Comic2PdfError::NoValidArtifacts);
    }
    info!("Merging {} validated artifact(s)", valid.len());

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Comic2PdfError::OutputWriteFailed {
                path: output.to_path_buf(),
                source: e,
            })?;
    }

    let out_path = output.to_path_buf();
    let outcome = tokio::task::spawn_blocking(move || merge_blocking(&valid, &out_path, strategy))
        .await
        .map_err(|e| Comic2PdfError::Internal(format!("merge task panicked: {e}")))??;

    validate_pdf_file(output, true).map_err(|reason| Comic2PdfError::OutputValidationFailed {
        path: output.to_path_buf(),
        reason,
    })?;

    Ok(outcome)
}

/// Strategy dispatch on the blocking pool. A structural-merge error degrades
/// to the largest-artifact copy rather than failing the run.
fn merge_blocking(
    artifacts: &[TempArtifact],
    output: &Path,
    strategy: MergeStrategy,
) -> Result<MergeOutcome, Comic2PdfError> {
    if strategy == MergeStrategy::Structural {
        match structural_merge(artifacts, output) {
            Ok(pages) => {
                return Ok(MergeOutcome {
                    pages,
                    strategy: MergeStrategy::Structural,
                })
            }
            Err(reason) => warn!("Structural merge failed ({}), copying largest artifact", reason),
        }
    }

    let pages = copy_largest_artifact(artifacts, output)
        .map_err(|reason| Comic2PdfError::Internal(format!("merge failed: {reason}")))?;
    Ok(MergeOutcome {
        pages,
        strategy: MergeStrategy::LargestArtifact,
    })
}

/// Load a parsed artifact through the process-wide cache.
fn load_cached(path: &Path) -> Result<Document, String> {
    if let Some(doc) = DOCUMENT_CACHE.get(&path.to_path_buf()) {
        debug!("Document cache hit: {}", path.display());
        return Ok((*doc).clone());
    }
    let doc =
        Document::load(path).map_err(|e| format!("cannot parse '{}': {e}", path.display()))?;
    DOCUMENT_CACHE.insert(path.to_path_buf(), doc.clone());
    Ok(doc)
}

/// Append every page of every artifact, in artifact order, into one document.
///
/// Objects from each source are renumbered into a disjoint id range; the old
/// page-tree roots are dropped and a single new Pages/Catalog pair is built
/// over the collected page objects.
fn structural_merge(artifacts: &[TempArtifact], output: &Path) -> Result<usize, String> {
    let mut max_id = 1;
    let mut pages_in_order: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut all_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for artifact in artifacts {
        let mut doc = load_cached(&artifact.path)?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, page_id) in doc.get_pages() {
            match doc.get_dictionary(page_id) {
                Ok(dict) => pages_in_order.push((page_id, dict.clone())),
                Err(e) => warn!(
                    "Skipping unreadable page in '{}': {}",
                    artifact.path.display(),
                    e
                ),
            }
        }
        all_objects.append(&mut doc.objects);
    }
    if pages_in_order.is_empty() {
        return Err("no pages found in intermediate documents".into());
    }

    let mut merged = Document::with_version("1.5");
    let mut root_ids: Vec<ObjectId> = Vec::new();

    for (object_id, object) in all_objects {
        // Old tree roots are rebuilt below; page dicts re-enter with a new
        // Parent. Everything else (content streams, images) carries over.
        let type_name = dict_type(&object).unwrap_or(&[]);
        if type_name == b"Page" {
            continue;
        }
        if type_name == b"Catalog"
            || type_name == b"Pages"
            || type_name == b"Outlines"
            || type_name == b"Outline"
        {
            root_ids.push(object_id);
        } else {
            merged.objects.insert(object_id, object);
        }
    }

    // Reuse vacated ids for the new tree roots to keep the id space disjoint.
    let pages_id = root_ids
        .first()
        .copied()
        .unwrap_or_else(|| (max_id, 0));
    let catalog_id = root_ids.get(1).copied().unwrap_or((max_id + 1, 0));

    for (page_id, mut dict) in pages_in_order.iter().cloned() {
        dict.set("Parent", pages_id);
        merged.objects.insert(page_id, Object::Dictionary(dict));
    }

    let kids: Vec<Object> = pages_in_order
        .iter()
        .map(|(id, _)| Object::Reference(*id))
        .collect();
    let page_count = kids.len();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_count as i64,
            "Kids" => kids,
        }),
    );
    merged.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );
    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.keys().map(|id| id.0).max().unwrap_or(1);
    merged.renumber_objects();
    merged.compress();
    merged
        .save(output)
        .map_err(|e| format!("cannot write '{}': {e}", output.display()))?;

    debug!("Structural merge wrote {} page(s) to {}", page_count, output.display());
    Ok(page_count)
}

fn dict_type(object: &Object) -> Option<&[u8]> {
    object.as_dict().ok()?.get(b"Type").ok()?.as_name().ok()
}

/// Degraded path: copy the single largest validated artifact verbatim.
fn copy_largest_artifact(artifacts: &[TempArtifact], output: &Path) -> Result<usize, String> {
    let largest = artifacts
        .iter()
        .max_by_key(|a| std::fs::metadata(&a.path).map(|m| m.len()).unwrap_or(0))
        .ok_or_else(|| "no artifacts to copy".to_string())?;

    std::fs::copy(&largest.path, output)
        .map_err(|e| format!("cannot copy '{}': {e}", largest.path.display()))?;
    info!(
        "Copied largest artifact '{}' ({} pages) to {}",
        largest.path.display(),
        largest.page_count,
        output.display()
    );
    Ok(largest.page_count)
}

/// Delete intermediate files, ignoring (but logging) individual failures.
///
/// Large sets are deleted concurrently on a small pool; small sets
/// sequentially. Extraction subdirectories fall with the per-run work
/// directory, so only files are handled here.
pub async fn cleanup_files(paths: Vec<PathBuf>) {
    let total = paths.len();
    if total > PARALLEL_CLEANUP_THRESHOLD {
        stream::iter(paths.into_iter().map(|p| async move {
            if let Err(e) = tokio::fs::remove_file(&p).await {
                debug!("Could not delete '{}': {}", p.display(), e);
            }
        }))
        .buffer_unordered(4)
        .collect::<Vec<()>>()
        .await;
    } else {
        for p in paths {
            if let Err(e) = tokio::fs::remove_file(&p).await {
                debug!("Could not delete '{}': {}", p.display(), e);
            }
        }
    }
    debug!("Cleanup pass over {} file(s) done", total);
}
