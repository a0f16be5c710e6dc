//! Pipeline stages for archive-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap
//! implementations (e.g. a different extraction tool) without touching other
//! stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ group ──▶ render ──▶ merge
//! (format)  (unar/zip)  (order +  (decode,   (structural
//!                        partition) encode)    merge)
//! ```
//!
//! 1. [`input`]   — classify the archive format; closed-enum dispatch
//! 2. [`extract`] — pull page images into the work dir; external tool with
//!    timeout, typed fallback to the in-process reader
//! 3. [`group`]   — dedup, natural sort, merge-order policy, partition into
//!    indexed groups; the only place page order is decided
//! 4. [`render`]  — bounded-parallel group rendering into intermediate PDFs,
//!    with the success-rate gate; [`encode`] holds the PDF writer
//! 5. [`merge`]   — validate intermediates and merge their pages in group
//!    order, or fall back to copying the largest one
pub mod encode;
pub mod extract;
pub mod group;
pub mod input;
pub mod merge;
pub mod render;
