//! Image encoding: RGB pixel buffer → artifact bytes on disk.
//!
//! Codec settings favour speed over size across the board: WebP uses the
//! fastest encoding method, JPEG skips size-optimisation passes, and PNG
//! uses the fastest compression preset. Page conversion is typically
//! encode-bound at high DPI, and callers who want smaller files can
//! post-process with a dedicated optimiser.
//!
//! The base64 variant reuses the WebP encoder: pages are WebP-encoded to
//! memory, base64-encoded, and the text written as raw bytes to a `.b64`
//! sidecar — the shape expected by data-URI and LLM-upload pipelines.

use crate::config::ImageFormat;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A successfully written page artifact.
#[derive(Debug, Clone)]
pub struct WrittenArtifact {
    pub path: PathBuf,
    pub bytes_written: u64,
}

/// Errors from the encode-and-write stage.
///
/// Split from [`crate::error::Pdf2ImgError`] so the per-page task can map
/// codec failures and write failures onto distinct [`crate::error::PageError`]
/// variants.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The codec rejected the pixel buffer.
    #[error("codec failure: {0}")]
    Codec(String),

    /// The artifact could not be written.
    #[error("write failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode `image` per `format` and write it to `path`.
///
/// `path` must already carry the format's extension (the per-page task
/// derives it from [`ImageFormat::extension`]); this function writes exactly
/// one file and overwrites any previous artifact at the same path.
///
/// `quality` applies to WebP and JPEG; PNG ignores it.
pub fn write_page(
    image: &RgbImage,
    path: &Path,
    format: ImageFormat,
    quality: u8,
) -> Result<WrittenArtifact, EncodeError> {
    let bytes = match format {
        ImageFormat::Webp => encode_webp(image, quality),
        ImageFormat::Jpeg | ImageFormat::Jpg => encode_jpeg(image, quality)?,
        ImageFormat::Png => encode_png(image)?,
        ImageFormat::Base64 => STANDARD.encode(encode_webp(image, quality)).into_bytes(),
    };

    std::fs::write(path, &bytes)?;
    debug!(
        "Wrote {} ({} bytes, {})",
        path.display(),
        bytes.len(),
        format
    );

    Ok(WrittenArtifact {
        path: path.to_path_buf(),
        bytes_written: bytes.len() as u64,
    })
}

/// Lossy WebP at `quality`, fastest method. Infallible for valid RGB input.
pub fn encode_webp(image: &RgbImage, quality: u8) -> Vec<u8> {
    let encoder = webp::Encoder::from_rgb(image.as_raw(), image.width(), image.height());
    encoder.encode(quality as f32).to_vec()
}

/// JPEG at `quality`, single pass, no size optimisation.
fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| EncodeError::Codec(e.to_string()))?;
    Ok(buf)
}

/// PNG at the fastest compression preset (larger files, quick encode).
fn encode_png(image: &RgbImage) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(
        Cursor::new(&mut buf),
        CompressionType::Fast,
        FilterType::NoFilter,
    );
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| EncodeError::Codec(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn test_image() -> RgbImage {
        RgbImage::from_fn(16, 16, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        })
    }

    #[test]
    fn webp_encode_produces_decodable_bytes() {
        let bytes = encode_webp(&test_image(), 80);
        assert!(!bytes.is_empty());

        let decoded = webp::Decoder::new(&bytes).decode().expect("valid webp");
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 16);
    }

    #[test]
    fn png_encode_round_trips() {
        let bytes = encode_png(&test_image()).expect("png encode");
        let back = image::load_from_memory(&bytes).expect("decode png");
        assert_eq!(back.width(), 16);
        assert_eq!(back.height(), 16);
        // PNG is lossless, so pixel content survives exactly.
        assert_eq!(back.into_rgb8().get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn jpeg_encode_round_trips() {
        let bytes = encode_jpeg(&test_image(), 90).expect("jpeg encode");
        let back = image::load_from_memory(&bytes).expect("decode jpeg");
        assert_eq!(back.width(), 16);
        assert_eq!(back.height(), 16);
    }

    #[test]
    fn write_page_writes_exactly_one_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc_1.png");

        let artifact =
            write_page(&test_image(), &path, ImageFormat::Png, 80).expect("write should succeed");
        assert_eq!(artifact.path, path);
        assert_eq!(
            artifact.bytes_written,
            std::fs::metadata(&path).expect("stat").len()
        );
        assert_eq!(std::fs::read_dir(dir.path()).expect("ls").count(), 1);
    }

    #[test]
    fn base64_sidecar_decodes_to_webp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc_1.b64");

        write_page(&test_image(), &path, ImageFormat::Base64, 80).expect("write should succeed");

        let text = std::fs::read(&path).expect("read sidecar");
        let webp_bytes = STANDARD.decode(&text).expect("sidecar must be base64");
        let decoded = webp::Decoder::new(&webp_bytes)
            .decode()
            .expect("payload must be valid webp");
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 16);
    }

    #[test]
    fn base64_payload_matches_webp_mode() {
        let dir = tempfile::tempdir().expect("tempdir");
        let webp_path = dir.path().join("doc_1.webp");
        let b64_path = dir.path().join("doc_1.b64");

        write_page(&test_image(), &webp_path, ImageFormat::Webp, 80).expect("webp write");
        write_page(&test_image(), &b64_path, ImageFormat::Base64, 80).expect("b64 write");

        let webp_bytes = std::fs::read(&webp_path).expect("read webp");
        let sidecar = std::fs::read(&b64_path).expect("read b64");
        let decoded = STANDARD.decode(&sidecar).expect("base64");
        assert_eq!(decoded, webp_bytes);
    }

    #[test]
    fn rewrite_overwrites_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc_1.webp");

        let first = write_page(&test_image(), &path, ImageFormat::Webp, 80).expect("first write");
        let second = write_page(&test_image(), &path, ImageFormat::Webp, 80).expect("second write");

        assert_eq!(first.bytes_written, second.bytes_written);
        assert_eq!(std::fs::read_dir(dir.path()).expect("ls").count(), 1);
    }

    #[test]
    fn write_page_surfaces_io_errors() {
        let err = write_page(
            &test_image(),
            Path::new("/definitely/missing/dir/doc_1.webp"),
            ImageFormat::Webp,
            80,
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::Io(_)));
    }
}
