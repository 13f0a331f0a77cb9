//! Batch driver: distribute per-page tasks and collect the results.
//!
//! ## Execution modes
//!
//! * **Sequential** (default): pages run one at a time, in ascending page
//!   order, on the blocking thread pool. Artifacts and progress events are
//!   observed strictly in page order.
//!
//! * **Parallel**: one worker *process* per page, at most
//!   [`ConversionConfig::worker_count`] in flight, driven by a
//!   `buffer_unordered` stream. Results are observed in completion order.
//!   Processes rather than threads because pdfium handles must never be
//!   shared across concurrent execution contexts; each worker opens its own
//!   document and touches only its own output file, so no coordination
//!   beyond spawn/wait is needed.
//!
//! ## Failure policy
//!
//! A failed page is recorded in its [`PageResult`] and the batch keeps
//! going; [`convert`] only returns `Err` when nothing at all could be done
//! (bad input, no output directory, or every attempted page failed).
//! Callers wanting all-or-nothing semantics chain
//! [`ConversionOutput::into_result`].

use crate::config::ConversionConfig;
use crate::error::{PageError, Pdf2ImgError};
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata, PageResult};
use crate::pipeline::page::{self, PageOptions};
use crate::pipeline::{input, render};
use crate::worker;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PDF file or URL to one image artifact per page.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL to a PDF
/// * `config` — Conversion configuration
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some pages failed
/// (check `output.stats.failed_pages`).
///
/// # Errors
/// Returns `Err(Pdf2ImgError)` only for fatal errors:
/// - File not found / permission denied / not a valid PDF
/// - Output directory cannot be created
/// - Explicit page selection entirely out of range
/// - Every attempted page failed
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2ImgError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    // ── Step 2: Ensure the output directory exists ───────────────────────
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| Pdf2ImgError::OutputDirFailed {
            path: config.output_dir.clone(),
            source: e,
        })?;

    // ── Step 3: Probe the document ───────────────────────────────────────
    // Opens and closes its own handle; per-page tasks open their own later.
    let metadata = render::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;
    info!(
        "PDF has {} pages; {} mode",
        total_pages,
        if config.parallel { "parallel" } else { "sequential" }
    );

    // An empty document is not an error: zero tasks, zero artifacts.
    if total_pages == 0 {
        return Ok(empty_output(metadata, config, total_start));
    }

    // ── Step 4: Compute page indices ─────────────────────────────────────
    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(Pdf2ImgError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    debug!("Selected {} pages for conversion", page_indices.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(page_indices.len());
    }

    // ── Step 5: Run the per-page tasks ───────────────────────────────────
    let mut pages = if config.parallel {
        process_parallel(&pdf_path, &page_indices, config).await?
    } else {
        process_sequential(&pdf_path, &page_indices, config).await
    };

    // Sort by page number for a deterministic report regardless of
    // completion order.
    pages.sort_by_key(|p| p.page_num);

    // ── Step 6: Compute stats ────────────────────────────────────────────
    let processed = pages.iter().filter(|p| p.is_ok()).count();
    let failed = pages.len() - processed;

    if processed == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());

        return Err(Pdf2ImgError::AllPagesFailed {
            total: pages.len(),
            first_error,
        });
    }

    let stats = ConversionStats {
        total_pages,
        selected_pages: page_indices.len(),
        processed_pages: processed,
        failed_pages: failed,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        parallel: config.parallel,
        workers: if config.parallel {
            config.worker_count()
        } else {
            1
        },
    };

    info!(
        "Conversion complete: {}/{} pages, {}ms total",
        processed,
        page_indices.len(),
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(page_indices.len(), processed);
    }

    Ok(ConversionOutput {
        pages,
        stats,
        metadata,
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2ImgError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2ImgError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Extract PDF metadata without converting any pages.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, Pdf2ImgError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    let pdf_path = resolved.path().to_path_buf();
    render::extract_metadata(&pdf_path, None).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The per-page task parameters shared by both execution modes.
pub(crate) fn page_options(config: &ConversionConfig) -> PageOptions {
    PageOptions {
        output_dir: config.output_dir.clone(),
        dpi: config.dpi,
        format: config.format,
        quality: config.quality,
        password: config.password.clone(),
    }
}

fn empty_output(
    metadata: DocumentMetadata,
    config: &ConversionConfig,
    total_start: Instant,
) -> ConversionOutput {
    info!("Document has no pages; nothing to do");
    ConversionOutput {
        pages: Vec::new(),
        stats: ConversionStats {
            total_pages: 0,
            selected_pages: 0,
            processed_pages: 0,
            failed_pages: 0,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            parallel: config.parallel,
            workers: if config.parallel {
                config.worker_count()
            } else {
                1
            },
        },
        metadata,
    }
}

/// Process pages one at a time, in ascending page order.
async fn process_sequential(
    pdf_path: &Path,
    page_indices: &[usize],
    config: &ConversionConfig,
) -> Vec<PageResult> {
    let total = page_indices.len();
    let opts = page_options(config);
    let mut results = Vec::with_capacity(total);

    for &idx in page_indices {
        let page_num = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, total);
        }

        let result = page::process_page(pdf_path, idx, opts.clone()).await;

        if let Some(ref cb) = config.progress_callback {
            match &result.error {
                None => cb.on_page_complete(
                    page_num,
                    total,
                    result.duration_ms,
                    result.bytes_written,
                ),
                Some(e) => cb.on_page_error(page_num, total, e.to_string()),
            }
        }
        results.push(result);
    }

    results
}

/// Process pages across a bounded pool of worker processes.
///
/// Results are collected in completion order; the caller sorts afterwards.
async fn process_parallel(
    pdf_path: &Path,
    page_indices: &[usize],
    config: &ConversionConfig,
) -> Result<Vec<PageResult>, Pdf2ImgError> {
    let worker_exe = resolve_worker_exe(config)?;
    let workers = config.worker_count();
    let total = page_indices.len();
    let opts = page_options(config);
    info!("Spawning up to {} page workers", workers);

    let results = stream::iter(page_indices.iter().map(|&idx| {
        let exe = worker_exe.clone();
        let path = pdf_path.to_path_buf();
        let opts = opts.clone();
        let cb = config.progress_callback.clone();
        async move {
            let page_num = idx + 1;
            if let Some(ref cb) = cb {
                cb.on_page_start(page_num, total);
            }
            let result = run_worker_page(&exe, &path, idx, &opts).await;
            if let Some(ref cb) = cb {
                match &result.error {
                    None => cb.on_page_complete(
                        page_num,
                        total,
                        result.duration_ms,
                        result.bytes_written,
                    ),
                    Some(e) => cb.on_page_error(page_num, total, e.to_string()),
                }
            }
            result
        }
    }))
    .buffer_unordered(workers)
    .collect()
    .await;

    Ok(results)
}

/// The executable to spawn as a page worker.
fn resolve_worker_exe(config: &ConversionConfig) -> Result<PathBuf, Pdf2ImgError> {
    match &config.worker_exe {
        Some(exe) => Ok(exe.clone()),
        None => std::env::current_exe().map_err(|e| Pdf2ImgError::WorkerSpawnFailed {
            detail: format!("cannot resolve current executable: {e}"),
        }),
    }
}

/// Spawn one worker process for one page and await its result.
///
/// A worker that exits abnormally or prints garbage yields a
/// [`PageError::WorkerFailed`] result; it never brings down the batch.
pub(crate) async fn run_worker_page(
    worker_exe: &Path,
    pdf_path: &Path,
    page_index: usize,
    opts: &PageOptions,
) -> PageResult {
    let page_num = page_index + 1;
    let start = Instant::now();

    let mut cmd = tokio::process::Command::new(worker_exe);
    cmd.args(worker::worker_args(pdf_path, page_index, opts))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(ref pw) = opts.password {
        cmd.env(worker::WORKER_PASSWORD_ENV, pw);
    }

    let output = match cmd.output().await {
        Ok(output) => output,
        Err(e) => {
            warn!("Page {page_num}: failed to spawn worker: {e}");
            return PageResult::failed(
                page_num,
                start.elapsed().as_millis() as u64,
                PageError::WorkerFailed {
                    page: page_num,
                    exit_code: None,
                    detail: format!("spawn failed: {e}"),
                },
            );
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    if let Some(result) = worker::parse_worker_stdout(page_index, &stdout) {
        return result;
    }

    // No parseable result line: the worker crashed before reporting.
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr
        .lines()
        .last()
        .filter(|l| !l.is_empty())
        .unwrap_or("worker produced no result line")
        .to_string();
    warn!(
        "Page {page_num}: worker exited with {:?}: {detail}",
        output.status.code()
    );

    PageResult::failed(
        page_num,
        start.elapsed().as_millis() as u64,
        PageError::WorkerFailed {
            page: page_num,
            exit_code: output.status.code(),
            detail,
        },
    )
}
