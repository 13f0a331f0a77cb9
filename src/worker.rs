//! Worker-process protocol for parallel mode.
//!
//! pdfium document handles cannot be shared across concurrent execution
//! contexts, so parallel mode gives every page its own OS process. The
//! driver re-executes the current binary with [`WORKER_SENTINEL`] as the
//! first argument, followed by the page task parameters; the worker renders
//! exactly one page and reports back over stdout.
//!
//! Binaries embedding this library must check [`is_worker_invocation`] at
//! the very top of `main` — before any argument parser runs — and hand the
//! argv to [`run_worker`]. The `pdf2img` CLI does exactly that.
//!
//! ## Wire format
//!
//! One tab-separated line on stdout, then exit:
//!
//! ```text
//! ok   <page_index> <duration_ms> <bytes_written> <artifact_path>
//! err  <page_index> <duration_ms> <error_detail>
//! ```
//!
//! The password for encrypted documents travels in the
//! `PDF2IMG_WORKER_PASSWORD` environment variable rather than argv, so it
//! never shows up in `ps` output.

use crate::config::ImageFormat;
use crate::error::PageError;
use crate::output::PageResult;
use crate::pipeline::page::{self, PageOptions};
use std::path::{Path, PathBuf};

/// First argv element identifying a worker invocation.
///
/// Deliberately not a valid file name, so it can never collide with a PDF
/// path passed as the normal positional argument.
pub const WORKER_SENTINEL: &str = "__pdf2img-page-worker";

/// Environment variable carrying the PDF password into the worker.
pub const WORKER_PASSWORD_ENV: &str = "PDF2IMG_WORKER_PASSWORD";

/// True when `args` (as returned by `std::env::args`) is a worker invocation.
pub fn is_worker_invocation(args: &[String]) -> bool {
    args.len() >= 2 && args[1] == WORKER_SENTINEL
}

/// Build the argv tail (everything after the executable) for one page task.
pub(crate) fn worker_args(
    pdf_path: &Path,
    page_index: usize,
    opts: &PageOptions,
) -> Vec<String> {
    vec![
        WORKER_SENTINEL.to_string(),
        pdf_path.to_string_lossy().into_owned(),
        page_index.to_string(),
        opts.output_dir.to_string_lossy().into_owned(),
        opts.dpi.to_string(),
        opts.format.name().to_string(),
        opts.quality.to_string(),
    ]
}

/// Parsed worker argv.
struct WorkerInvocation {
    pdf_path: PathBuf,
    page_index: usize,
    opts: PageOptions,
}

/// Parse the argv of a worker invocation. `None` on arity or syntax errors.
fn parse_worker_args(args: &[String]) -> Option<WorkerInvocation> {
    // [exe, SENTINEL, pdf, page_index, output_dir, dpi, format, quality]
    if args.len() != 8 || args[1] != WORKER_SENTINEL {
        return None;
    }
    Some(WorkerInvocation {
        pdf_path: PathBuf::from(&args[2]),
        page_index: args[3].parse().ok()?,
        opts: PageOptions {
            output_dir: PathBuf::from(&args[4]),
            dpi: args[5].parse().ok()?,
            format: ImageFormat::from_name(&args[6]),
            quality: args[7].parse().ok()?,
            password: std::env::var(WORKER_PASSWORD_ENV).ok(),
        },
    })
}

/// Run one page task from a worker argv and return the process exit code.
///
/// Prints the wire-format result line to stdout. Exit codes: 0 on success,
/// 1 when the page failed, 2 on a malformed invocation.
pub fn run_worker(args: &[String]) -> i32 {
    let Some(invocation) = parse_worker_args(args) else {
        eprintln!(
            "pdf2img worker: bad invocation, expected \
             {WORKER_SENTINEL} <pdf> <page_index> <output_dir> <dpi> <format> <quality>"
        );
        return 2;
    };

    let result = page::process_page_blocking(
        &invocation.pdf_path,
        invocation.page_index,
        &invocation.opts,
    );

    match &result.error {
        None => {
            println!(
                "ok\t{}\t{}\t{}\t{}",
                invocation.page_index,
                result.duration_ms,
                result.bytes_written,
                result.output_path.as_deref().unwrap_or(Path::new("")).display()
            );
            0
        }
        Some(e) => {
            println!(
                "err\t{}\t{}\t{}",
                invocation.page_index,
                result.duration_ms,
                // Keep the wire format one line per result.
                e.to_string().replace('\n', " ")
            );
            1
        }
    }
}

/// Reconstruct a [`PageResult`] from a worker's stdout line.
///
/// `None` when the line does not match the wire format (the driver then
/// falls back to a [`PageError::WorkerFailed`] built from the exit status).
pub(crate) fn parse_worker_stdout(page_index: usize, stdout: &str) -> Option<PageResult> {
    // The result line is the last thing the worker prints, but stray
    // diagnostics can follow it when output is interleaved; scan backwards.
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with("ok\t") || l.starts_with("err\t"))?;
    let page_num = page_index + 1;

    if let Some(rest) = line.strip_prefix("ok\t") {
        let mut fields = rest.splitn(4, '\t');
        let reported_index: usize = fields.next()?.parse().ok()?;
        if reported_index != page_index {
            return None;
        }
        let duration_ms: u64 = fields.next()?.parse().ok()?;
        let bytes_written: u64 = fields.next()?.parse().ok()?;
        let path = fields.next()?;
        return Some(PageResult {
            page_num,
            output_path: Some(PathBuf::from(path)),
            bytes_written,
            duration_ms,
            error: None,
        });
    }

    if let Some(rest) = line.strip_prefix("err\t") {
        let mut fields = rest.splitn(3, '\t');
        let reported_index: usize = fields.next()?.parse().ok()?;
        if reported_index != page_index {
            return None;
        }
        let duration_ms: u64 = fields.next()?.parse().ok()?;
        let detail = fields.next()?.to_string();
        return Some(PageResult::failed(
            page_num,
            duration_ms,
            PageError::WorkerFailed {
                page: page_num,
                exit_code: Some(1),
                detail,
            },
        ));
    }

    None
}
