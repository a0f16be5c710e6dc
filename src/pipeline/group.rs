//! Ordering and partitioning of extracted page images.
//!
//! Page order is decided here, exactly once, before any parallel work:
//! deduplicate, natural-sort, apply the merge-order policy, then cut the
//! list into consecutive groups tagged with their position. Workers complete
//! out of order, but the group index assigned here is the only reordering
//! key the rest of the pipeline uses.

use crate::config::{MergeOrder, SpeedMode};
use crate::error::Comic2PdfError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One page image resolved to a concrete path during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageAsset {
    pub path: PathBuf,
}

impl ImageAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// A contiguous, ordered slice of assets rendered together into one
/// intermediate document.
#[derive(Debug, Clone)]
pub struct Group {
    /// Zero-based position in partition order. Survives out-of-order
    /// completion; the merger sorts artifacts by this index.
    pub index: usize,
    pub assets: Vec<ImageAsset>,
}

// ── Natural sort ─────────────────────────────────────────────────────────

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

/// One comparison unit of a natural-sort key.
///
/// Derived `Ord` places numbers before text when a path runs out of
/// segments mid-comparison, which keeps the ordering total.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyPart {
    Number(u128),
    Text(String),
}

/// Natural-sort key: digit runs as integers, everything else lowercased,
/// so `page2` sorts before `page10`.
pub fn natural_key(path: &Path) -> Vec<KeyPart> {
    let lossy = path.to_string_lossy();
    let s: &str = lossy.as_ref();
    let mut parts = Vec::new();
    let mut last = 0;

    for m in DIGIT_RUN.find_iter(s) {
        if m.start() > last {
            parts.push(KeyPart::Text(s[last..m.start()].to_lowercase()));
        }
        // Digit runs longer than u128 fit are pathological; compare as text.
        match m.as_str().parse::<u128>() {
            Ok(n) => parts.push(KeyPart::Number(n)),
            Err(_) => parts.push(KeyPart::Text(m.as_str().to_string())),
        }
        last = m.end();
    }
    if last < s.len() {
        parts.push(KeyPart::Text(s[last..].to_lowercase()));
    }
    parts
}

// ── Ordering ─────────────────────────────────────────────────────────────

/// Remove duplicate paths, keeping the first occurrence of each.
pub fn dedup_assets(assets: Vec<ImageAsset>) -> Vec<ImageAsset> {
    let mut seen = HashSet::new();
    assets
        .into_iter()
        .filter(|a| seen.insert(a.path.clone()))
        .collect()
}

/// Natural-sort the assets, then apply the merge-order policy on top.
///
/// The policy is applied exactly once per run; grouping never re-sorts.
///
/// # Errors
/// [`Comic2PdfError::InvalidConfig`] when a custom order's length does not
/// match the asset count (the permutation's internal validity is checked at
/// config build time).
pub fn order_assets(
    mut assets: Vec<ImageAsset>,
    order: &MergeOrder,
) -> Result<Vec<ImageAsset>, Comic2PdfError> {
    assets.sort_by_cached_key(|a| natural_key(&a.path));

    match order {
        MergeOrder::Natural => Ok(assets),
        MergeOrder::Alphabetical => {
            // File name only, strictly lexicographic.
            assets.sort_by_cached_key(|a| {
                a.path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .unwrap_or_default()
            });
            Ok(assets)
        }
        MergeOrder::Reversed => {
            assets.reverse();
            Ok(assets)
        }
        MergeOrder::Custom(permutation) => {
            if permutation.len() != assets.len() {
                return Err(Comic2PdfError::InvalidConfig(format!(
                    "custom merge order has {} entries but the archive yielded {} unique images",
                    permutation.len(),
                    assets.len()
                )));
            }
            // Re-checked here because configs can be built without the
            // builder's validation.
            let mut seen = vec![false; assets.len()];
            for &i in permutation {
                if i >= assets.len() || seen[i] {
                    return Err(Comic2PdfError::InvalidConfig(format!(
                        "custom merge order must be a permutation of 0..{}",
                        assets.len()
                    )));
                }
                seen[i] = true;
            }
            Ok(permutation.iter().map(|&i| assets[i].clone()).collect())
        }
    }
}

// ── Group sizing & partition ─────────────────────────────────────────────

/// Compute how many images go into each intermediate document.
///
/// Heuristic: speed mode sets the base (25/40/60); many workers halve it,
/// few workers grow it by half; very large archives cap it at 30 and small
/// ones floor it at 15; the result is clamped so every worker gets at least
/// one group and no group drops below 10 images.
pub fn group_size_for(total: usize, speed: SpeedMode, workers: usize) -> usize {
    let base = speed.base_group_size();

    let mut size = if workers > 6 {
        base / 2
    } else if workers < 3 {
        base * 3 / 2
    } else {
        base
    };

    if total > 1000 {
        size = size.min(30);
    } else if total < 100 {
        size = size.max(15);
    }

    let per_worker = total / workers.max(1);
    size.min(per_worker).max(10)
}

/// Cut the ordered asset list into consecutive groups of `group_size`
/// (the last group may be smaller), assigning zero-based indices in
/// partition order.
pub fn partition(assets: Vec<ImageAsset>, group_size: usize) -> Vec<Group> {
    assets
        .chunks(group_size.max(1))
        .enumerate()
        .map(|(index, chunk)| Group {
            index,
            assets: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assets(names: &[&str]) -> Vec<ImageAsset> {
        names.iter().map(|n| ImageAsset::new(*n)).collect()
    }

    fn names(assets: &[ImageAsset]) -> Vec<String> {
        assets
            .iter()
            .map(|a| a.path.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn natural_key_orders_digit_runs_numerically() {
        let mut v = assets(&["page10.png", "page2.png", "page1.png"]);
        v.sort_by_cached_key(|a| natural_key(&a.path));
        assert_eq!(names(&v), vec!["page1.png", "page2.png", "page10.png"]);
    }

    #[test]
    fn natural_key_is_case_insensitive() {
        let mut v = assets(&["Page2.png", "page10.png"]);
        v.sort_by_cached_key(|a| natural_key(&a.path));
        assert_eq!(names(&v), vec!["Page2.png", "page10.png"]);
    }

    #[test]
    fn natural_key_handles_leading_zeros() {
        let mut v = assets(&["p010.png", "p2.png", "p003.png"]);
        v.sort_by_cached_key(|a| natural_key(&a.path));
        assert_eq!(names(&v), vec!["p2.png", "p003.png", "p010.png"]);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let v = dedup_assets(assets(&["b.png", "a.png", "b.png", "a.png"]));
        assert_eq!(names(&v), vec!["b.png", "a.png"]);
    }

    #[test]
    fn order_natural() {
        let v = order_assets(assets(&["p3.png", "p1.png", "p2.png"]), &MergeOrder::Natural)
            .unwrap();
        assert_eq!(names(&v), vec!["p1.png", "p2.png", "p3.png"]);
    }

    #[test]
    fn order_reversed() {
        let v = order_assets(assets(&["p1.png", "p3.png", "p2.png"]), &MergeOrder::Reversed)
            .unwrap();
        assert_eq!(names(&v), vec!["p3.png", "p2.png", "p1.png"]);
    }

    #[test]
    fn order_alphabetical_uses_file_name_only() {
        // Natural order would put p2 before p10; alphabetical flips them.
        let v = order_assets(
            assets(&["dir/p10.png", "dir/p2.png"]),
            &MergeOrder::Alphabetical,
        )
        .unwrap();
        assert_eq!(names(&v), vec!["dir/p10.png", "dir/p2.png"]);
    }

    #[test]
    fn order_custom_applies_permutation_over_natural() {
        let v = order_assets(
            assets(&["p2.png", "p3.png", "p1.png"]),
            &MergeOrder::Custom(vec![2, 0, 1]),
        )
        .unwrap();
        // Natural: p1 p2 p3; permutation picks [p3, p1, p2].
        assert_eq!(names(&v), vec!["p3.png", "p1.png", "p2.png"]);
    }

    #[test]
    fn order_custom_rejects_wrong_length() {
        let err = order_assets(
            assets(&["p1.png", "p2.png"]),
            &MergeOrder::Custom(vec![0, 1, 2]),
        )
        .unwrap_err();
        assert!(matches!(err, Comic2PdfError::InvalidConfig(_)));
    }

    #[test]
    fn group_size_heuristic_table() {
        // Mid-range everything: base size survives untouched.
        assert_eq!(group_size_for(200, SpeedMode::Normal, 5), 25);
        // Many workers halve; huge archive caps at 30.
        assert_eq!(group_size_for(2000, SpeedMode::VeryFast, 8), 30);
        // Single worker grows by half; small archive floor doesn't bind.
        assert_eq!(group_size_for(50, SpeedMode::Normal, 1), 37);
        // Tiny archive: per-worker clamp then the 10-image floor.
        assert_eq!(group_size_for(5, SpeedMode::Normal, 1), 10);
        // Fast mode, few workers: 40*3/2 = 60, then the per-worker clamp bites.
        assert_eq!(group_size_for(90, SpeedMode::Fast, 2), 45);
        // More workers than images still yields the floor.
        assert_eq!(group_size_for(8, SpeedMode::VeryFast, 12), 10);
    }

    #[test]
    fn partition_invariants() {
        let v: Vec<ImageAsset> = (0..25)
            .map(|i| ImageAsset::new(format!("p{i:03}.png")))
            .collect();
        let groups = partition(v.clone(), 10);

        assert_eq!(groups.len(), 3);
        // Contiguous zero-based indices.
        for (i, g) in groups.iter().enumerate() {
            assert_eq!(g.index, i);
            assert!(!g.assets.is_empty());
        }
        // Last group holds the remainder.
        assert_eq!(groups[2].assets.len(), 5);
        // Every asset exactly once, in order.
        let flattened: Vec<ImageAsset> = groups.into_iter().flat_map(|g| g.assets).collect();
        assert_eq!(flattened, v);
    }
}
