//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::load_from_memory` |
//! | Crop | `DynamicImage::crop_imm`, plus `resize_exact` (CatmullRom) for residual scale |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |

use super::backend::{BackendError, Dimensions, EncodedImage, ImageBackend};
use super::params::{CropParams, OutputFormat, Quality, ResizeParams};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an encoded buffer, sniffing the format from its magic bytes.
fn load_image(data: &[u8]) -> Result<DynamicImage, BackendError> {
    image::load_from_memory(data).map_err(|e| BackendError::DecodeFailed(e.to_string()))
}

/// Encode a DynamicImage into the requested container.
fn encode_image(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let result = match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
            rgb.write_with_encoder(encoder)
        }
        OutputFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new(&mut buf);
            img.write_with_encoder(encoder)
        }
        OutputFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut buf);
            rgba.write_with_encoder(encoder)
        }
        OutputFormat::Avif => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut buf,
                6,
                quality.value() as u8,
            );
            rgb.write_with_encoder(encoder)
        }
    };
    result.map_err(|e| {
        BackendError::EncodeFailed(format!("{} encode failed: {}", format.extension(), e))
    })?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn identify(&self, data: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| BackendError::DecodeFailed(e.to_string()))?
            .into_dimensions()
            .map_err(|e| BackendError::DecodeFailed(format!("Failed to read dimensions: {}", e)))?;
        Ok(Dimensions { width, height })
    }

    fn crop(&self, params: &CropParams<'_>) -> Result<EncodedImage, BackendError> {
        let img = load_image(params.source)?;
        let region = params.region;
        if region.x + region.width > img.width() || region.y + region.height > img.height() {
            return Err(BackendError::ProcessingFailed(format!(
                "crop {}x{}+{}+{} outside {}x{} image",
                region.width,
                region.height,
                region.x,
                region.y,
                img.width(),
                img.height()
            )));
        }

        let cropped = img.crop_imm(region.x, region.y, region.width, region.height);
        let output = if (region.width, region.height) == (params.width, params.height) {
            cropped
        } else {
            cropped.resize_exact(params.width, params.height, FilterType::CatmullRom)
        };

        let bytes = encode_image(&output, params.format, params.quality)?;
        Ok(EncodedImage {
            bytes,
            format: params.format,
            width: output.width(),
            height: output.height(),
        })
    }

    fn resize(&self, params: &ResizeParams<'_>) -> Result<EncodedImage, BackendError> {
        let img = load_image(params.source)?;
        let resized = if (img.width(), img.height()) == (params.width, params.height) {
            img
        } else {
            img.resize_exact(params.width, params.height, FilterType::Lanczos3)
        };
        let bytes = encode_image(&resized, params.format, params.quality)?;
        Ok(EncodedImage {
            bytes,
            format: params.format,
            width: resized.width(),
            height: resized.height(),
        })
    }
}
