//! Progress-callback trait for per-group conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline extracts, renders, and merges.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a GUI, or a terminal progress bar without the
//! library knowing anything about how the host application communicates. The
//! trait is `Send + Sync` because groups render concurrently.

use std::sync::Arc;

/// Called by the conversion pipeline as it works through an archive.
///
/// Implementations must be `Send + Sync`; `on_group_complete` and
/// `on_group_error` may fire concurrently from different workers, in
/// completion order — which is not group order. All methods have default
/// no-op implementations so callers only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after extraction, before any rendering.
    ///
    /// # Arguments
    /// * `images` — unique images extracted from the archive
    /// * `groups` — number of groups they were partitioned into
    fn on_render_start(&self, images: usize, groups: usize) {
        let _ = (images, groups);
    }

    /// Called when a group's intermediate PDF has been written and validated.
    fn on_group_complete(&self, group_index: usize, total_groups: usize) {
        let _ = (group_index, total_groups);
    }

    /// Called when a group fails (all images invalid, encode error, or the
    /// artifact failed validation).
    fn on_group_error(&self, group_index: usize, total_groups: usize, error: &str) {
        let _ = (group_index, total_groups, error);
    }

    /// Called once after the merge stage writes and validates the output.
    ///
    /// # Arguments
    /// * `pages` — page count of the final document
    fn on_merge_complete(&self, pages: usize) {
        let _ = pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
