//! Result types returned by the conversion entry points.
//!
//! A batch run produces one [`PageResult`] per selected page — success or
//! failure — plus aggregate [`ConversionStats`]. Everything derives
//! `Serialize`/`Deserialize` so the CLI `--json` mode is a straight
//! `serde_json::to_string_pretty` away.

use crate::error::{PageError, Pdf2ImgError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of a single page's render-and-encode task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number (matches the number in the output filename).
    pub page_num: usize,

    /// Path of the written artifact. `None` when the page failed.
    pub output_path: Option<PathBuf>,

    /// Size of the written artifact in bytes. 0 when the page failed.
    pub bytes_written: u64,

    /// Wall-clock duration of the render+encode task for this page.
    pub duration_ms: u64,

    /// The page's failure, if any. The batch keeps going either way.
    pub error: Option<PageError>,
}

impl PageResult {
    /// Build a failed result carrying only the error and elapsed time.
    pub fn failed(page_num: usize, duration_ms: u64, error: PageError) -> Self {
        Self {
            page_num,
            output_path: None,
            bytes_written: 0,
            duration_ms,
            error: Some(error),
        }
    }

    /// True when the page produced an artifact.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for a conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Page count of the source document.
    pub total_pages: usize,
    /// Pages selected for conversion (after `--pages` filtering).
    pub selected_pages: usize,
    /// Pages that produced an artifact.
    pub processed_pages: usize,
    /// Pages that failed.
    pub failed_pages: usize,
    /// Total wall-clock duration of the batch.
    pub total_duration_ms: u64,
    /// Whether worker processes were used.
    pub parallel: bool,
    /// Worker-pool size (1 in sequential mode).
    pub workers: usize,
}

/// Result of a full conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Per-page outcomes, sorted by page number.
    pub pages: Vec<PageResult>,
    /// Aggregate statistics.
    pub stats: ConversionStats,
    /// Document metadata captured during the page-count probe.
    pub metadata: DocumentMetadata,
}

impl ConversionOutput {
    /// Treat any page failure as an error.
    ///
    /// The default contract is partial-success: `convert` returns `Ok` as
    /// long as at least one page succeeded. Callers that want all-or-nothing
    /// semantics chain this instead of inspecting `stats` by hand.
    pub fn into_result(self) -> Result<ConversionOutput, Pdf2ImgError> {
        if self.stats.failed_pages > 0 {
            Err(Pdf2ImgError::PartialFailure {
                success: self.stats.processed_pages,
                failed: self.stats.failed_pages,
                total: self.stats.selected_pages,
            })
        } else {
            Ok(self)
        }
    }

    /// Iterate over the failed pages' errors.
    pub fn failures(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(|p| p.error.as_ref())
    }
}

/// Document metadata extracted from a PDF without rendering any pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_with(processed: usize, failed: usize) -> ConversionOutput {
        let mut pages = Vec::new();
        for i in 0..processed {
            pages.push(PageResult {
                page_num: i + 1,
                output_path: Some(PathBuf::from(format!("out/doc_{}.webp", i + 1))),
                bytes_written: 1024,
                duration_ms: 10,
                error: None,
            });
        }
        for i in 0..failed {
            let page_num = processed + i + 1;
            pages.push(PageResult::failed(
                page_num,
                5,
                PageError::RenderFailed {
                    page: page_num,
                    detail: "boom".into(),
                },
            ));
        }
        ConversionOutput {
            stats: ConversionStats {
                total_pages: processed + failed,
                selected_pages: processed + failed,
                processed_pages: processed,
                failed_pages: failed,
                total_duration_ms: 42,
                parallel: false,
                workers: 1,
            },
            pages,
            metadata: DocumentMetadata::default(),
        }
    }

    #[test]
    fn into_result_passes_on_full_success() {
        assert!(output_with(3, 0).into_result().is_ok());
    }

    #[test]
    fn into_result_rejects_partial_failure() {
        let err = output_with(2, 1).into_result().unwrap_err();
        match err {
            Pdf2ImgError::PartialFailure {
                success,
                failed,
                total,
            } => {
                assert_eq!((success, failed, total), (2, 1, 3));
            }
            other => panic!("expected PartialFailure, got {other:?}"),
        }
    }

    #[test]
    fn failures_iterates_only_errors() {
        let output = output_with(2, 2);
        assert_eq!(output.failures().count(), 2);
    }

    #[test]
    fn output_round_trips_through_json() {
        let output = output_with(1, 1);
        let json = serde_json::to_string(&output).expect("serialise");
        let back: ConversionOutput = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back.stats.processed_pages, 1);
        assert_eq!(back.pages.len(), 2);
        assert!(back.pages[1].error.is_some());
    }
}
