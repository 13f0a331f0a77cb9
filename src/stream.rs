//! Streaming conversion API: emit page results as they complete.
//!
//! ## Why stream?
//!
//! Large documents take a while. A streams-based API lets callers display
//! partial results immediately, wire up their own progress reporting, or
//! react to failures per page instead of waiting for the whole batch.
//!
//! Unlike the eager [`crate::convert::convert`] which returns only after
//! all pages finish, [`convert_stream`] yields one [`PageResult`] per page
//! as it completes — in page order for sequential mode, in completion order
//! for parallel mode (sort by `page_num` if order matters). Progress
//! callbacks are not fired here; the stream itself is the progress signal.

use crate::config::ConversionConfig;
use crate::convert::{page_options, run_worker_page};
use crate::error::Pdf2ImgError;
use crate::output::PageResult;
use crate::pipeline::{input, page, render};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = PageResult> + Send>>;

/// Convert a PDF to images, streaming page results as they are ready.
///
/// The returned stream owns the resolved input: URL downloads stay on disk
/// until the stream is dropped.
///
/// # Returns
/// - `Ok(PageStream)` — a stream of [`PageResult`] items (failed pages are
///   items too, carrying their [`crate::error::PageError`])
/// - `Err(Pdf2ImgError)` — fatal error (file not found, not a PDF, etc.)
pub async fn convert_stream(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<PageStream, Pdf2ImgError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming conversion: {}", input_str);

    // ── Resolve input ────────────────────────────────────────────────────
    // Kept in an Arc captured by every page future so a downloaded temp
    // file outlives the lazily evaluated stream.
    let resolved = Arc::new(input::resolve_input(input_str, config.download_timeout_secs).await?);
    let pdf_path = resolved.path().to_path_buf();

    // ── Ensure the output directory exists ───────────────────────────────
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| Pdf2ImgError::OutputDirFailed {
            path: config.output_dir.clone(),
            source: e,
        })?;

    // ── Probe page count ─────────────────────────────────────────────────
    let total_pages = render::page_count(&pdf_path, config.password.as_deref()).await?;

    if total_pages == 0 {
        return Ok(Box::pin(stream::empty::<PageResult>()));
    }

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(Pdf2ImgError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }

    let opts = page_options(config);

    // ── Build the stream ─────────────────────────────────────────────────
    if config.parallel {
        let worker_exe = match &config.worker_exe {
            Some(exe) => exe.clone(),
            None => std::env::current_exe().map_err(|e| Pdf2ImgError::WorkerSpawnFailed {
                detail: format!("cannot resolve current executable: {e}"),
            })?,
        };
        let workers = config.worker_count();

        let s = stream::iter(page_indices.into_iter().map(move |idx| {
            let exe = worker_exe.clone();
            let path = pdf_path.clone();
            let opts = opts.clone();
            let resolved = Arc::clone(&resolved);
            async move {
                let result = run_worker_page(&exe, &path, idx, &opts).await;
                drop(resolved);
                result
            }
        }))
        .buffer_unordered(workers);

        Ok(Box::pin(s))
    } else {
        let s = stream::iter(page_indices.into_iter()).then(move |idx| {
            let path = pdf_path.clone();
            let opts = opts.clone();
            let resolved = Arc::clone(&resolved);
            async move {
                let result = page::process_page(&path, idx, opts).await;
                drop(resolved);
                result
            }
        });

        Ok(Box::pin(s))
    }
}
