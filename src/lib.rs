//! # pdf2img
//!
//! Convert each page of a PDF document into a raster image file.
//!
//! ## Why this crate?
//!
//! Feeding PDFs to thumbnailers, OCR services, and vision-model pipelines
//! means rasterising pages first — reliably, at a chosen DPI, and fast
//! enough that a 300-page document is not a coffee break. This crate wraps
//! pdfium (the Chromium PDF engine) for rendering and battle-tested image
//! codecs for encoding, and adds a multi-process mode that keeps every
//! pdfium document handle confined to a single process.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input   resolve local file or download from URL
//!  ├─ 2. Probe   page count + metadata (own short-lived handle)
//!  ├─ 3. Render  rasterise each page via pdfium (CPU-bound, spawn_blocking
//!  │             in-process, or one worker process per page)
//!  ├─ 4. Encode  WebP / JPEG / PNG / base64-WebP sidecar
//!  └─ 5. Output  one artifact per page + per-page timing stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2img::{convert, ConversionConfig, ImageFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .output_dir("out")
//!         .dpi(150)
//!         .format(ImageFormat::Png)
//!         .build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     for page in &output.pages {
//!         println!("page {}: {:?} ({}ms)", page.page_num, page.output_path, page.duration_ms);
//!     }
//!     eprintln!("{} pages in {}ms", output.stats.processed_pages, output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Output naming
//!
//! Artifacts are written as `<output_dir>/<pdf-stem>_<N>.<ext>` with 1-based
//! page numbers: `sample.pdf` at `--format png` yields `out/sample_1.png`,
//! `out/sample_2.png`, … Re-running with the same arguments overwrites the
//! same files.
//!
//! ## Parallel mode
//!
//! `--parallel` renders pages across separate OS processes (not threads):
//! pdfium document handles are not safely shareable across concurrent
//! execution contexts, so each worker opens the PDF itself and renders
//! exactly one page. Binaries embedding this library must route the worker
//! argv at the top of `main` — see [`worker`] for the two-line dance the
//! `pdf2img` CLI does.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2img` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf2img = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ImageFormat, PageSelection};
pub use convert::{convert, convert_sync, inspect};
pub use error::{PageError, Pdf2ImgError};
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata, PageResult};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::convert_stream;
