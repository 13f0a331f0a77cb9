//! CLI binary for pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` and prints results. Also hosts the parallel-mode
//! page worker: when re-executed with the worker sentinel argv, `main`
//! short-circuits into `worker::run_worker` before clap ever runs.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2img::{
    convert, inspect, worker, ConversionConfig, ConversionProgressCallback, ImageFormat,
    PageSelection, Pdf2ImgError, ProgressCallback,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Exit codes ───────────────────────────────────────────────────────────────
// One code per error category so scripts can react without parsing stderr.

const EXIT_INPUT: i32 = 2;
const EXIT_DOCUMENT: i32 = 3;
const EXIT_RENDER: i32 = 4;
const EXIT_ENCODE: i32 = 5;
const EXIT_IO: i32 = 6;
const EXIT_PARTIAL: i32 = 7;

fn exit_code_for(err: &Pdf2ImgError) -> i32 {
    use Pdf2ImgError::*;
    match err {
        FileNotFound { .. } | PermissionDenied { .. } | InvalidInput { .. }
        | DownloadFailed { .. } | DownloadTimeout { .. } | NotAPdf { .. }
        | InvalidConfig(_) => EXIT_INPUT,
        CorruptPdf { .. } | PasswordRequired { .. } | WrongPassword { .. }
        | PageOutOfRange { .. } => EXIT_DOCUMENT,
        RenderFailed { .. } | AllPagesFailed { .. } | PdfiumBindingFailed(_) => EXIT_RENDER,
        EncodeFailed { .. } => EXIT_ENCODE,
        OutputDirFailed { .. } | OutputWriteFailed { .. } => EXIT_IO,
        PartialFailure { .. } => EXIT_PARTIAL,
        WorkerSpawnFailed { .. } | Internal(_) => 1,
    }
}

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

fn human_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-page log
/// lines using [indicatif]. Designed to work correctly when pages complete
/// out-of-order (parallel mode).
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Count of pages that errored out.
    errors: AtomicUsize,
    /// Execution mode blurb shown in the start line.
    mode: String,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_conversion_start` (called before any pages are processed).
    fn new_dynamic(mode: String) -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_conversion_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
            mode,
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Converting {total_pages} pages ({})…",
                self.mode
            ))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(
        &self,
        page_num: usize,
        total: usize,
        duration_ms: u64,
        bytes_written: u64,
    ) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&human_bytes(bytes_written)),
            dim(&format!("{:.2}s", duration_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages converted  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every page to WebP in ./output
  pdf2img document.pdf

  # PNG at 150 DPI into a custom directory
  pdf2img --dpi 150 --format png -o pages document.pdf

  # Use all cores, one worker process per page
  pdf2img --parallel document.pdf

  # Four workers, JPEG at quality 90
  pdf2img --parallel --max-workers 4 --format jpeg --quality 90 scan.pdf

  # Base64-encoded WebP sidecars (.b64) for upload pipelines
  pdf2img --format base64 slides.pdf

  # Only pages 3-15 of a PDF fetched over HTTPS
  pdf2img --pages 3-15 https://arxiv.org/pdf/1706.03762 -o attention

  # Inspect PDF metadata (no rendering)
  pdf2img --inspect-only document.pdf

  # Machine-readable per-page report
  pdf2img --json document.pdf > report.json

OUTPUT NAMING:
  <output-dir>/<pdf-stem>_<page>.<ext>   (1-based page numbers)
  sample.pdf --format png   →  output/sample_1.png, output/sample_2.png, …
  sample.pdf --format base64 →  output/sample_1.b64, …

EXIT CODES:
  0  all pages converted        4  rasterisation failed
  2  bad input / bad arguments  5  encoding failed
  3  unreadable or encrypted    6  filesystem error
     document                   7  some pages failed

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to an existing libpdfium — skips auto-download
  PDFIUM_FETCH_CACHE_DIR  Override the default pdfium cache directory

SETUP:
  PDFium (~30 MB) is downloaded automatically on first run and cached in
  ~/.cache/pdf2img/pdfium-7690/. No manual library setup is required.
"#;

/// Convert PDF pages to image files.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Convert PDF pages to WebP/JPEG/PNG images",
    long_about = "Convert each page of a PDF document (local file or URL) into a raster \
image artifact. Rendering is delegated to pdfium; pages can be rasterised sequentially \
or across a pool of worker processes.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory to write page images to (created if missing).
    #[arg(short, long, env = "PDF2IMG_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Rendering DPI (72–600). PDF native resolution is 72.
    #[arg(long, env = "PDF2IMG_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Render pages across worker processes (one per page, pooled).
    #[arg(long, env = "PDF2IMG_PARALLEL")]
    parallel: bool,

    /// Worker-pool size. Defaults to the machine's available parallelism.
    #[arg(short = 'w', long, env = "PDF2IMG_MAX_WORKERS")]
    max_workers: Option<usize>,

    /// Output image format.
    #[arg(short, long, env = "PDF2IMG_FORMAT", value_enum, default_value = "webp")]
    format: FormatArg,

    /// Codec quality, 1–100 (ignored for png).
    #[arg(short, long, env = "PDF2IMG_QUALITY", default_value_t = 80,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2IMG_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2IMG_PASSWORD")]
    password: Option<String>,

    /// Output a structured JSON report instead of human-readable text.
    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2IMG_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(long, env = "PDF2IMG_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, env = "PDF2IMG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Webp,
    Jpeg,
    Jpg,
    Png,
    Base64,
}

impl From<FormatArg> for ImageFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Webp => ImageFormat::Webp,
            FormatArg::Jpeg => ImageFormat::Jpeg,
            FormatArg::Jpg => ImageFormat::Jpg,
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Base64 => ImageFormat::Base64,
        }
    }
}

fn main() -> Result<()> {
    // Parallel-mode page worker: must run before clap sees the argv, and
    // without paying for a tokio runtime the single-page task never uses.
    let argv: Vec<String> = std::env::args().collect();
    if worker::is_worker_invocation(&argv) {
        std::process::exit(worker::run_worker(&argv));
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?
        .block_on(run())
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let mode = if cli.parallel {
            match cli.max_workers {
                Some(n) => format!("parallel, {n} workers"),
                None => "parallel".to_string(),
            }
        } else {
            "sequential".to_string()
        };
        let cb = CliProgressCallback::new_dynamic(mode);
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = match convert(&cli.input, &config).await {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{} {e}", red("error:"));
            std::process::exit(exit_code_for(&e));
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        // The progress callback already printed per-page lines; add the
        // total-duration summary either way.
        eprintln!(
            "{}  {}/{} pages  →  {}  {}",
            if output.stats.failed_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.stats.processed_pages,
            output.stats.selected_pages,
            bold(&cli.output_dir.display().to_string()),
            dim(&format!(
                "{:.2}s total",
                output.stats.total_duration_ms as f64 / 1000.0
            )),
        );
        for failure in output.failures() {
            eprintln!("   {} {failure}", red("✗"));
        }
    }

    if output.stats.failed_pages > 0 {
        std::process::exit(EXIT_PARTIAL);
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut builder = ConversionConfig::builder()
        .output_dir(&cli.output_dir)
        .dpi(cli.dpi)
        .format(cli.format.into())
        .quality(cli.quality)
        .parallel(cli.parallel)
        .pages(pages)
        .download_timeout_secs(cli.download_timeout);

    if let Some(n) = cli.max_workers {
        builder = builder.max_workers(n);
    }
    if let Some(ref pw) = cli.password {
        builder = builder.password(pw.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start.trim().parse().context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        for &p in &pages {
            if p < 1 {
                anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
            }
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
