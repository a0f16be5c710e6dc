//! CLI binary for comic2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` and prints results.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use comic2pdf::{
    convert_report, ConversionConfig, ConversionProgressCallback, MergeOrder, MergeStrategy,
    ProgressCallback, ResizeTarget, SpeedMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar tracking group completion. Groups
/// finish out of order in concurrent mode; the bar only counts them.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_render_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Extracting");
        bar.set_message("reading archive…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_render_start(&self, images: usize, groups: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos:>2}/{len} groups  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(groups as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {images} images in {groups} group(s)…"))
        ));
    }

    fn on_group_complete(&self, group_index: usize, total_groups: usize) {
        self.bar.println(format!(
            "  {} Group {:>2}/{:<2} rendered",
            green("✓"),
            group_index + 1,
            total_groups
        ));
        self.bar.inc(1);
    }

    fn on_group_error(&self, group_index: usize, total_groups: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Group {:>2}/{:<2}  {}",
            red("✗"),
            group_index + 1,
            total_groups,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_merge_complete(&self, pages: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} merged {} page(s)", green("✔"), bold(&pages.to_string()));
        } else {
            eprintln!(
                "{} merged {} page(s)  ({} group(s) failed)",
                cyan("⚠"),
                bold(&pages.to_string()),
                red(&failed.to_string())
            );
        }
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    Natural,
    Alphabetical,
    Reversed,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SpeedArg {
    Normal,
    Fast,
    VeryFast,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResizeArg {
    A4,
    Letter,
    A3,
    A5,
    Hd,
    Fhd,
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (output next to the archive, or in your manga library)
  comic2pdf vol1.cbz

  # Explicit output path, grayscale, A4-fitted pages
  comic2pdf vol1.cbr -o vol1.pdf --grayscale --resize a4

  # Faster, wider: bigger groups on 8 workers
  comic2pdf vol1.cbz --speed very-fast --workers 8

  # Reverse reading order
  comic2pdf vol1.cbz --order reversed

  # Explicit page permutation (indices into the natural order)
  comic2pdf vol1.cbz --custom-order 2,0,1,3,4

  # Machine-readable stats
  comic2pdf vol1.cbz --stats-json

SUPPORTED INPUTS:
  .cbz / .zip   zip-based comic archives (in-process reader)
  .cbr / .rar   rar-based comic archives (unar subprocess, zip fallback)
  .epub         recognized but not implemented — use CBZ/CBR

The external `unar` tool is optional: without it, CBR conversion still
works for the (common) archives that are really zip files.
"#;

/// Convert comic book archives (CBZ/CBR) to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "comic2pdf",
    version,
    about = "Convert comic book archives (CBZ/CBR) to PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the source archive (.cbz, .cbr, .zip, .rar).
    input: PathBuf,

    /// Write the PDF here instead of the derived default location.
    #[arg(short, long, env = "COMIC2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Convert pages to grayscale.
    #[arg(long)]
    grayscale: bool,

    /// Fit pages into a named bounding box (never upscales).
    #[arg(long, value_enum)]
    resize: Option<ResizeArg>,

    /// Page ordering policy.
    #[arg(long, value_enum, default_value = "natural")]
    order: OrderArg,

    /// Explicit page permutation (comma-separated indices into the natural
    /// order); overrides --order.
    #[arg(long, value_delimiter = ',')]
    custom_order: Option<Vec<usize>>,

    /// Speed mode controlling images per intermediate PDF.
    #[arg(long, value_enum, default_value = "normal")]
    speed: SpeedArg,

    /// Number of groups rendered concurrently.
    #[arg(short, long, env = "COMIC2PDF_WORKERS", default_value_t = 5)]
    workers: usize,

    /// Timeout for the external `unar` tool, in seconds.
    #[arg(long, default_value_t = 60)]
    extract_timeout: u64,

    /// JPEG quality for encoded pages (1–100).
    #[arg(long, default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Minimum fraction of groups that must render before merging.
    #[arg(long, default_value_t = 1.0 / 3.0)]
    min_success_ratio: f64,

    /// Skip the structural merge and copy the largest intermediate verbatim.
    #[arg(long)]
    largest_only: bool,

    /// Print conversion stats as JSON on stdout.
    #[arg(long)]
    stats_json: bool,

    /// Suppress the progress bar.
    #[arg(short, long)]
    quiet: bool,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn to_config(&self, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
        let merge_order = match (&self.custom_order, self.order) {
            (Some(order), _) => MergeOrder::Custom(order.clone()),
            (None, OrderArg::Natural) => MergeOrder::Natural,
            (None, OrderArg::Alphabetical) => MergeOrder::Alphabetical,
            (None, OrderArg::Reversed) => MergeOrder::Reversed,
        };

        let mut builder = ConversionConfig::builder()
            .grayscale(self.grayscale)
            .merge_order(merge_order)
            .speed(match self.speed {
                SpeedArg::Normal => SpeedMode::Normal,
                SpeedArg::Fast => SpeedMode::Fast,
                SpeedArg::VeryFast => SpeedMode::VeryFast,
            })
            .workers(self.workers)
            .extract_timeout_secs(self.extract_timeout)
            .jpeg_quality(self.jpeg_quality)
            .min_success_ratio(self.min_success_ratio)
            .merge_strategy(if self.largest_only {
                MergeStrategy::LargestArtifact
            } else {
                MergeStrategy::Structural
            });

        if let Some(resize) = self.resize {
            builder = builder.resize(match resize {
                ResizeArg::A4 => ResizeTarget::A4,
                ResizeArg::Letter => ResizeTarget::Letter,
                ResizeArg::A3 => ResizeTarget::A3,
                ResizeArg::A5 => ResizeTarget::A5,
                ResizeArg::Hd => ResizeTarget::Hd,
                ResizeArg::Fhd => ResizeTarget::Fhd,
            });
        }
        if let Some(cb) = progress {
            builder = builder.progress_callback(cb);
        }

        Ok(builder.build()?)
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "comic2pdf=warn",
        1 => "comic2pdf=debug",
        _ => "comic2pdf=trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let progress: Option<ProgressCallback> = if cli.quiet {
        None
    } else {
        Some(CliProgressCallback::new() as ProgressCallback)
    };
    let config = cli.to_config(progress)?;

    let report = convert_report(&cli.input, cli.output.as_deref(), &config).await;

    if report.success {
        eprintln!("{} {}", green("✔"), report.message);
        if let Some(ref output) = report.output {
            let s = &output.stats;
            eprintln!(
                "{}",
                dim(&format!(
                    "  {} image(s) in {} group(s) · extract {}ms · render {}ms · merge {}ms",
                    s.unique_images,
                    s.group_count,
                    s.extract_duration_ms,
                    s.render_duration_ms,
                    s.merge_duration_ms
                ))
            );
            if cli.stats_json {
                println!("{}", serde_json::to_string_pretty(output)?);
            }
        }
        Ok(())
    } else {
        eprintln!("{} {}", red("✘"), report.message);
        std::process::exit(1);
    }
}
