//! PDF rasterisation: render a single page to an RGB buffer via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations, preventing the Tokio worker
//! threads from stalling during CPU-heavy rendering.
//!
//! ## Why one document handle per call?
//!
//! Every entry point here opens its own `PdfDocument` and lets it drop at
//! scope end. Handles are never stored or shared: parallel mode runs pages
//! in separate OS processes, and a handle opened in one process is useless
//! (and unsafe to imitate) in another. Scoped open-render-drop keeps the
//! resource story identical in both execution modes.

use crate::error::Pdf2ImgError;
use crate::output::DocumentMetadata;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// Rasterise one page of a PDF into an RGB pixel buffer.
///
/// The page is rendered at `round(page_points * dpi / 72)` pixels per axis
/// (PDF native resolution is 72 points per inch).
///
/// This runs inside `spawn_blocking` since pdfium operations are CPU-bound.
pub async fn render_page(
    pdf_path: &Path,
    page_index: usize,
    dpi: u32,
    password: Option<&str>,
) -> Result<RgbImage, Pdf2ImgError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || {
        render_page_blocking(&path, page_index, dpi, pwd.as_deref())
    })
    .await
    .map_err(|e| Pdf2ImgError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of single-page rendering.
pub fn render_page_blocking(
    pdf_path: &Path,
    page_index: usize,
    dpi: u32,
    password: Option<&str>,
) -> Result<RgbImage, Pdf2ImgError> {
    let pdfium = bind()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if page_index >= total_pages {
        return Err(Pdf2ImgError::PageOutOfRange {
            page: page_index + 1,
            total: total_pages,
        });
    }

    let page = pages
        .get(page_index as u16)
        .map_err(|e| Pdf2ImgError::RenderFailed {
            page: page_index + 1,
            detail: format!("{:?}", e),
        })?;

    // Target pixel dimensions from the page size in points (1 pt = 1/72 in).
    let scale = dpi as f32 / 72.0;
    let width_px = (page.width().value * scale).round() as i32;
    let height_px = (page.height().value * scale).round() as i32;

    let render_config = PdfRenderConfig::new()
        .set_target_width(width_px)
        .set_target_height(height_px);

    let bitmap =
        page.render_with_config(&render_config)
            .map_err(|e| Pdf2ImgError::RenderFailed {
                page: page_index + 1,
                detail: format!("{:?}", e),
            })?;

    let image = bitmap.as_image().into_rgb8();
    debug!(
        "Rendered page {} → {}x{} px at {} DPI",
        page_index + 1,
        image.width(),
        image.height(),
        dpi
    );

    // `document` drops here, releasing the pdfium handle on every exit path.
    Ok(image)
}

/// Probe the page count of a PDF.
///
/// Opens and closes its own document handle; the driver calls this once
/// before distributing per-page tasks.
pub async fn page_count(pdf_path: &Path, password: Option<&str>) -> Result<usize, Pdf2ImgError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || {
        let pdfium = bind()?;
        let document = open_document(&pdfium, &path, pwd.as_deref())?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| Pdf2ImgError::Internal(format!("Page-count task panicked: {}", e)))?
}

/// Extract document metadata from a PDF without rendering pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2ImgError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Metadata task panicked: {}", e)))?
}

/// Blocking implementation of metadata extraction.
fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2ImgError> {
    let pdfium = bind()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let pages = document.pages();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: pages.len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Bind to the pdfium shared library, downloading it on first use.
fn bind() -> Result<Pdfium, Pdf2ImgError> {
    pdfium_fetch::bind_pdfium_silent().map_err(|e| Pdf2ImgError::PdfiumBindingFailed(e.to_string()))
}

/// Open a document, mapping pdfium's opaque load errors onto our taxonomy.
fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2ImgError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2ImgError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Pdf2ImgError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Pdf2ImgError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}
