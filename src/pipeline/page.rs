//! The per-page unit of work: render one page, encode it, write the artifact.
//!
//! This is the task distributed across execution modes. It is deliberately
//! self-contained — it opens its own document handle, owns its pixel buffer,
//! and touches only its own output file — so the same function body serves
//! the sequential loop, the async driver (via `spawn_blocking`), and the
//! parallel-mode worker process without any shared state.
//!
//! Failures are captured in the returned [`PageResult`] rather than
//! propagated: one bad page never aborts the batch.

use crate::config::ImageFormat;
use crate::error::PageError;
use crate::output::PageResult;
use crate::pipeline::{encode, render};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;

/// Everything a page task needs besides the PDF path and page index.
///
/// Kept small and owned so it crosses `spawn_blocking` and worker-argv
/// boundaries without borrowing from the driver.
#[derive(Debug, Clone)]
pub struct PageOptions {
    pub output_dir: PathBuf,
    pub dpi: u32,
    pub format: ImageFormat,
    pub quality: u8,
    pub password: Option<String>,
}

/// Compute the artifact path for a page: `<output_dir>/<pdf-stem>_<N>.<ext>`
/// with 1-based page numbering.
///
/// The filename is assembled with `format!` rather than `Path::with_extension`
/// so PDF stems containing dots (`report.final.pdf`) keep their full stem.
pub fn artifact_path(
    output_dir: &Path,
    pdf_path: &Path,
    page_index: usize,
    format: ImageFormat,
) -> PathBuf {
    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    output_dir.join(format!(
        "{}_{}.{}",
        stem,
        page_index + 1,
        format.extension()
    ))
}

/// Render, encode, and write one page, measuring wall-clock duration.
///
/// Never returns `Err`: failures are folded into the [`PageResult`] so the
/// driver can keep going and report a summary afterwards.
pub fn process_page_blocking(pdf_path: &Path, page_index: usize, opts: &PageOptions) -> PageResult {
    let page_num = page_index + 1;
    let start = Instant::now();

    let image = match render::render_page_blocking(
        pdf_path,
        page_index,
        opts.dpi,
        opts.password.as_deref(),
    ) {
        Ok(image) => image,
        Err(e) => {
            warn!("Page {page_num}: render failed: {e}");
            return PageResult::failed(
                page_num,
                start.elapsed().as_millis() as u64,
                PageError::RenderFailed {
                    page: page_num,
                    detail: e.to_string(),
                },
            );
        }
    };

    let path = artifact_path(&opts.output_dir, pdf_path, page_index, opts.format);
    match encode::write_page(&image, &path, opts.format, opts.quality) {
        Ok(artifact) => PageResult {
            page_num,
            output_path: Some(artifact.path),
            bytes_written: artifact.bytes_written,
            duration_ms: start.elapsed().as_millis() as u64,
            error: None,
        },
        Err(encode::EncodeError::Codec(detail)) => {
            warn!("Page {page_num}: encode failed: {detail}");
            PageResult::failed(
                page_num,
                start.elapsed().as_millis() as u64,
                PageError::EncodeFailed {
                    page: page_num,
                    detail,
                },
            )
        }
        Err(encode::EncodeError::Io(e)) => {
            warn!("Page {page_num}: write failed: {e}");
            PageResult::failed(
                page_num,
                start.elapsed().as_millis() as u64,
                PageError::WriteFailed {
                    page: page_num,
                    detail: e.to_string(),
                },
            )
        }
    }
}

/// Async wrapper: run the page task on the blocking pool.
pub async fn process_page(pdf_path: &Path, page_index: usize, opts: PageOptions) -> PageResult {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || process_page_blocking(&path, page_index, &opts))
        .await
        .unwrap_or_else(|e| {
            PageResult::failed(
                page_index + 1,
                0,
                PageError::RenderFailed {
                    page: page_index + 1,
                    detail: format!("page task panicked: {e}"),
                },
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_path_uses_one_based_numbering() {
        let path = artifact_path(
            Path::new("out"),
            Path::new("/docs/sample.pdf"),
            0,
            ImageFormat::Png,
        );
        assert_eq!(path, PathBuf::from("out/sample_1.png"));
    }

    #[test]
    fn artifact_path_base64_uses_b64_extension() {
        let path = artifact_path(
            Path::new("out"),
            Path::new("sample.pdf"),
            2,
            ImageFormat::Base64,
        );
        assert_eq!(path, PathBuf::from("out/sample_3.b64"));
    }

    #[test]
    fn artifact_path_preserves_dotted_stems() {
        let path = artifact_path(
            Path::new("out"),
            Path::new("report.final.pdf"),
            0,
            ImageFormat::Webp,
        );
        assert_eq!(path, PathBuf::from("out/report.final_1.webp"));
    }

    #[test]
    fn artifact_path_preserves_caller_jpeg_spelling() {
        let jpeg = artifact_path(Path::new("out"), Path::new("a.pdf"), 0, ImageFormat::Jpeg);
        let jpg = artifact_path(Path::new("out"), Path::new("a.pdf"), 0, ImageFormat::Jpg);
        assert_eq!(jpeg, PathBuf::from("out/a_1.jpeg"));
        assert_eq!(jpg, PathBuf::from("out/a_1.jpg"));
    }
}
