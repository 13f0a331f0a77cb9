//! Configuration types for PDF-to-image conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across tasks, serialise the relevant fields for
//! a worker process argv, and diff two runs to understand why their outputs
//! differ.
//!
//! # Design choice: builder over constructor
//! A ten-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::Pdf2ImgError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Output encoding for rendered pages.
///
/// Each variant owns its file extension and codec parameters, so format
/// dispatch is a single `match` instead of a chain of string comparisons.
/// `Jpeg` and `Jpg` encode identically; they exist as separate variants so
/// the extension the caller asked for is the extension they get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossy WebP at the configured quality, fastest encoding method. (default)
    #[default]
    Webp,
    /// JPEG at the configured quality, no size-optimisation passes.
    Jpeg,
    /// Same encoder as [`ImageFormat::Jpeg`], `.jpg` extension.
    Jpg,
    /// PNG at the fastest compression preset. Quality is ignored.
    Png,
    /// WebP-encode to memory, then write the base64 text as a `.b64` file.
    Base64,
}

impl ImageFormat {
    /// File extension for artifacts of this format (no leading dot).
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Webp => "webp",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Base64 => "b64",
        }
    }

    /// Parse a format name, falling back to WebP for anything unrecognised.
    ///
    /// The fallback is deliberate policy, not an error: the CLI already
    /// enumerates valid choices, so this path is only reachable through
    /// direct API use, where a usable default beats a refusal.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "webp" => ImageFormat::Webp,
            "jpeg" => ImageFormat::Jpeg,
            "jpg" => ImageFormat::Jpg,
            "png" => ImageFormat::Png,
            "base64" => ImageFormat::Base64,
            _ => ImageFormat::Webp,
        }
    }

    /// Canonical lowercase name, suitable for worker argv round-trips.
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Webp => "webp",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Base64 => "base64",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for a PDF-to-image conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2img::{ConversionConfig, ImageFormat};
///
/// let config = ConversionConfig::builder()
///     .dpi(150)
///     .format(ImageFormat::Png)
///     .output_dir("out")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory artifacts are written to, created recursively if absent.
    /// Default: `output`.
    pub output_dir: PathBuf,

    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 300.
    ///
    /// PDF pages are measured in points (72 per inch), so the rasterisation
    /// scale factor is `dpi / 72` in both axes. 300 DPI is print quality;
    /// drop to 150 for thumbnails or OCR-adjacent pipelines where speed and
    /// file size matter more than pixel density.
    pub dpi: u32,

    /// Output encoding. Default: [`ImageFormat::Webp`].
    pub format: ImageFormat,

    /// Codec quality, 1–100. Default: 80. Ignored for PNG, which uses a
    /// fixed fast-compression preset instead.
    pub quality: u8,

    /// Render pages across worker processes instead of in-process. Default: false.
    ///
    /// Workers are separate OS processes, not threads: each opens its own
    /// pdfium document, so no handle is ever shared across concurrent
    /// execution contexts. Parallel mode re-executes the current binary
    /// with a sentinel argv — see [`crate::worker`].
    pub parallel: bool,

    /// Number of worker processes in flight at once. `None` means the
    /// machine's available parallelism. Only meaningful with `parallel`.
    pub max_workers: Option<usize>,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Progress callback invoked per page; completion order is not page
    /// order in parallel mode.
    pub progress_callback: Option<ProgressCallback>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Executable spawned as the page worker in parallel mode.
    /// `None` (the default) uses `std::env::current_exe()`.
    pub worker_exe: Option<PathBuf>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            dpi: 300,
            format: ImageFormat::Webp,
            quality: 80,
            parallel: false,
            max_workers: None,
            pages: PageSelection::default(),
            password: None,
            progress_callback: None,
            download_timeout_secs: 120,
            worker_exe: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("output_dir", &self.output_dir)
            .field("dpi", &self.dpi)
            .field("format", &self.format)
            .field("quality", &self.quality)
            .field("parallel", &self.parallel)
            .field("max_workers", &self.max_workers)
            .field("pages", &self.pages)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .field("worker_exe", &self.worker_exe)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolved worker-pool size for parallel mode.
    pub fn worker_count(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn format(mut self, format: ImageFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality.clamp(1, 100);
        self
    }

    pub fn parallel(mut self, v: bool) -> Self {
        self.config.parallel = v;
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = Some(n.max(1));
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn worker_exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.config.worker_exe = Some(exe.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2ImgError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.quality == 0 || c.quality > 100 {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "Quality must be 1–100, got {}",
                c.quality
            )));
        }
        if c.max_workers == Some(0) {
            return Err(Pdf2ImgError::InvalidConfig(
                "max_workers must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_extensions_match_table() {
        assert_eq!(ImageFormat::Webp.extension(), "webp");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpeg");
        assert_eq!(ImageFormat::Jpg.extension(), "jpg");
        assert_eq!(ImageFormat::Png.extension(), "png");
        assert_eq!(ImageFormat::Base64.extension(), "b64");
    }

    #[test]
    fn unknown_format_falls_back_to_webp() {
        assert_eq!(ImageFormat::from_name("tiff"), ImageFormat::Webp);
        assert_eq!(ImageFormat::from_name(""), ImageFormat::Webp);
        assert_eq!(ImageFormat::from_name("WEBP"), ImageFormat::Webp);
        assert_eq!(ImageFormat::from_name("JPG"), ImageFormat::Jpg);
    }

    #[test]
    fn format_name_round_trips() {
        for fmt in [
            ImageFormat::Webp,
            ImageFormat::Jpeg,
            ImageFormat::Jpg,
            ImageFormat::Png,
            ImageFormat::Base64,
        ] {
            assert_eq!(ImageFormat::from_name(fmt.name()), fmt);
        }
    }

    #[test]
    fn builder_clamps_dpi_and_quality() {
        let config = ConversionConfig::builder()
            .dpi(10_000)
            .quality(200)
            .build()
            .expect("clamped values must validate");
        assert_eq!(config.dpi, 600);
        assert_eq!(config.quality, 100);
    }

    #[test]
    fn builder_defaults() {
        let config = ConversionConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.dpi, 300);
        assert_eq!(config.format, ImageFormat::Webp);
        assert_eq!(config.quality, 80);
        assert!(!config.parallel);
        assert!(config.max_workers.is_none());
    }

    #[test]
    fn worker_count_default_is_positive() {
        let config = ConversionConfig::default();
        assert!(config.worker_count() >= 1);
        let config = ConversionConfig::builder().max_workers(3).build().unwrap();
        assert_eq!(config.worker_count(), 3);
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![1, 3, 5]).to_indices(5),
            vec![0, 2, 4]
        );
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2] // deduplicated and sorted
        );
    }

    #[test]
    fn page_selection_empty_document() {
        assert_eq!(PageSelection::All.to_indices(0), Vec::<usize>::new());
    }
}
