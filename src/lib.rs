//! # comic2pdf
//!
//! Convert comic book archives (CBZ/CBR) into a single PDF.
//!
//! ## Why this crate?
//!
//! Comic archives are just bags of page scans; readers that want one
//! paginated document need the pages located, ordered the way a human
//! expects (`page2` before `page10`), rendered, and stitched together —
//! while surviving the torn files and duplicate entries that real-world
//! archives are full of. This crate does exactly that, skipping broken
//! pages instead of failing the whole book, and refusing to emit an output
//! when too much of the book was lost.
//!
//! ## Pipeline Overview
//!
//! ```text
//! archive
//!  │
//!  ├─ 1. Input    classify format (closed enum: CBZ / CBR / EPUB-stub)
//!  ├─ 2. Extract  unar subprocess with timeout, or in-process zip reader
//!  ├─ 3. Group    dedup, natural sort, merge-order policy, partition
//!  ├─ 4. Render   bounded-parallel groups → intermediate PDFs + gate
//!  ├─ 5. Merge    structural page merge (or largest-artifact fallback)
//!  └─ 6. Cleanup  temp artifacts deleted, success or failure
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use comic2pdf::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("vol1.cbz", &config).await?;
//!     println!("{} pages → {}", output.pages, output.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `comic2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! comic2pdf = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, MergeOrder, MergeStrategy, ResizeTarget, SpeedMode,
};
pub use convert::{convert, convert_report, convert_sync, convert_to, default_output_path};
pub use error::{Comic2PdfError, GroupError};
pub use output::{ConversionOutput, ConversionReport, ConversionStats};
pub use pipeline::input::ArchiveFormat;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
