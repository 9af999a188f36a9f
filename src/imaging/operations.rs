//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{calculate_bounded_dimensions, scale_crop_to_natural};
use super::params::{CropParams, PixelRect, ResizeParams};
use crate::config::{ExtractConfig, OptimizeConfig};
use crate::preview::PreviewRegistry;
use crate::types::{ExtractedBlob, OptimizedAsset, SourceImage};
use std::sync::Arc;
use tracing::{info, warn};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Plan a crop without executing it.
///
/// Maps the displayed-pixel `crop` onto the source's natural pixels. The
/// output size stays the displayed crop size.
pub fn plan_crop<'a>(
    source: &'a SourceImage,
    crop: PixelRect,
    display: (u32, u32),
    config: &ExtractConfig,
) -> Result<CropParams<'a>> {
    if crop.is_degenerate() || display.0 == 0 || display.1 == 0 {
        return Err(BackendError::ProcessingFailed(format!(
            "degenerate crop {}x{}",
            crop.width, crop.height
        )));
    }
    Ok(CropParams {
        source: source.bytes(),
        region: scale_crop_to_natural(crop, display, source.natural_dimensions()),
        width: crop.width,
        height: crop.height,
        format: config.format,
        quality: config.quality(),
    })
}

/// Copy the confirmed crop out of the source image.
///
/// The result is exactly `crop.width × crop.height`.
pub fn extract_crop(
    backend: &dyn ImageBackend,
    source: &SourceImage,
    crop: PixelRect,
    display: (u32, u32),
    config: &ExtractConfig,
) -> Result<ExtractedBlob> {
    let params = plan_crop(source, crop, display, config)?;
    let encoded = backend.crop(&params)?;
    Ok(ExtractedBlob {
        bytes: Arc::from(encoded.bytes),
        format: encoded.format,
        width: encoded.width,
        height: encoded.height,
    })
}

/// Shrink and re-encode an extracted crop for upload.
///
/// Best-effort: when the backend fails, the failure is logged and the
/// unmodified blob comes back with `fell_back` set. Never returns an error.
pub fn optimize_image(
    backend: &dyn ImageBackend,
    previews: &Arc<PreviewRegistry>,
    blob: &ExtractedBlob,
    config: &OptimizeConfig,
) -> OptimizedAsset {
    let (width, height) = calculate_bounded_dimensions(
        (blob.width, blob.height),
        (config.max_width, config.max_height),
    );
    let params = ResizeParams {
        source: &blob.bytes,
        width,
        height,
        format: config.format,
        quality: config.quality(),
    };

    match backend.resize(&params) {
        Ok(encoded) => {
            info!(
                from = %format!("{}x{}", blob.width, blob.height),
                to = %format!("{}x{}", encoded.width, encoded.height),
                original_bytes = blob.bytes.len(),
                optimized_bytes = encoded.bytes.len(),
                "optimized photo"
            );
            let bytes: Arc<[u8]> = Arc::from(encoded.bytes);
            let preview = previews.register(Arc::clone(&bytes), encoded.format.mime_type());
            OptimizedAsset {
                bytes,
                format: encoded.format,
                width: encoded.width,
                height: encoded.height,
                preview,
                fell_back: false,
            }
        }
        Err(err) => {
            warn!(error = %err, "optimization failed, uploading the unoptimized crop");
            let preview = previews.register(Arc::clone(&blob.bytes), blob.mime_type());
            OptimizedAsset {
                bytes: Arc::clone(&blob.bytes),
                format: blob.format,
                width: blob.width,
                height: blob.height,
                preview,
                fell_back: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{OutputFormat, Quality};
    use crate::test_helpers::{create_test_jpeg, source_image, source_image_from_bytes};

    fn blob(width: u32, height: u32) -> ExtractedBlob {
        ExtractedBlob {
            bytes: Arc::from(vec![7u8; 32]),
            format: OutputFormat::Jpeg,
            width,
            height,
        }
    }

    #[test]
    fn plan_crop_maps_to_natural_pixels() {
        let previews = PreviewRegistry::new();
        let source = source_image(&previews, 2000, 1000);
        let crop = PixelRect {
            x: 250,
            y: 0,
            width: 500,
            height: 500,
        };
        let params = plan_crop(&source, crop, (1000, 500), &ExtractConfig::default()).unwrap();
        assert_eq!(
            params.region,
            PixelRect {
                x: 500,
                y: 0,
                width: 1000,
                height: 1000
            }
        );
        assert_eq!((params.width, params.height), (500, 500));
        assert_eq!(params.quality, Quality::new(95));
    }

    #[test]
    fn extract_crop_output_matches_selection() {
        let previews = PreviewRegistry::new();
        let backend = MockBackend::new();
        let source = source_image(&previews, 2000, 1000);
        let crop = PixelRect {
            x: 500,
            y: 0,
            width: 1000,
            height: 1000,
        };

        let blob =
            extract_crop(&backend, &source, crop, (2000, 1000), &ExtractConfig::default()).unwrap();
        assert_eq!((blob.width, blob.height), (1000, 1000));
        assert_eq!(blob.mime_type(), "image/jpeg");
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Crop {
                region: crop,
                width: 1000,
                height: 1000,
                format: OutputFormat::Jpeg,
                quality: 95,
            }]
        );
    }

    #[test]
    fn extract_degenerate_crop_fails_without_backend_call() {
        let previews = PreviewRegistry::new();
        let backend = MockBackend::new();
        let source = source_image(&previews, 100, 100);
        let crop = PixelRect {
            x: 10,
            y: 10,
            width: 0,
            height: 0,
        };
        let result = extract_crop(&backend, &source, crop, (100, 100), &ExtractConfig::default());
        assert!(result.is_err());
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn extract_propagates_backend_failure() {
        let previews = PreviewRegistry::new();
        let backend = MockBackend::new();
        backend
            .fail_crop
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let source = source_image(&previews, 100, 100);
        let crop = PixelRect {
            x: 0,
            y: 0,
            width: 50,
            height: 50,
        };
        let result = extract_crop(&backend, &source, crop, (100, 100), &ExtractConfig::default());
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn optimize_downscales_to_bounds() {
        let previews = PreviewRegistry::new();
        let backend = MockBackend::new();
        let asset = optimize_image(&backend, &previews, &blob(1000, 1000), &OptimizeConfig::default());

        assert!(!asset.fell_back);
        assert_eq!((asset.width, asset.height), (512, 512));
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Resize {
                width: 512,
                height: 512,
                format: OutputFormat::Jpeg,
                quality: 85,
            }]
        );
        assert!(previews.resolve(asset.preview.url()).is_some());
    }

    #[test]
    fn optimize_never_upscales() {
        let previews = PreviewRegistry::new();
        let backend = MockBackend::new();
        let asset = optimize_image(&backend, &previews, &blob(300, 200), &OptimizeConfig::default());
        assert_eq!((asset.width, asset.height), (300, 200));
    }

    #[test]
    fn optimize_keeps_aspect_when_shrinking() {
        let previews = PreviewRegistry::new();
        let backend = MockBackend::new();
        let config = OptimizeConfig {
            max_width: 400,
            max_height: 300,
            format: OutputFormat::Webp,
            ..OptimizeConfig::default()
        };
        let asset = optimize_image(&backend, &previews, &blob(1600, 900), &config);
        assert_eq!((asset.width, asset.height), (400, 225));
        assert_eq!(asset.mime_type(), "image/webp");
    }

    #[test]
    fn optimize_falls_back_on_encoder_failure() {
        let previews = PreviewRegistry::new();
        let backend = MockBackend::failing_resize();
        let original = blob(1000, 1000);

        let asset = optimize_image(&backend, &previews, &original, &OptimizeConfig::default());
        assert!(asset.fell_back);
        assert_eq!((asset.width, asset.height), (1000, 1000));
        assert_eq!(&asset.bytes[..], &original.bytes[..]);
        assert_eq!(asset.mime_type(), "image/jpeg");

        let (bytes, mime) = previews.resolve(asset.preview.url()).unwrap();
        assert_eq!(&bytes[..], &original.bytes[..]);
        assert_eq!(mime, "image/jpeg");
    }

    #[test]
    fn optimize_real_image_end_to_end() {
        let previews = PreviewRegistry::new();
        let backend = crate::imaging::RustBackend::new();
        let source = source_image_from_bytes(&previews, create_test_jpeg(800, 400));
        let crop = PixelRect {
            x: 200,
            y: 0,
            width: 400,
            height: 400,
        };
        let extracted =
            extract_crop(&backend, &source, crop, (800, 400), &ExtractConfig::default()).unwrap();
        assert_eq!((extracted.width, extracted.height), (400, 400));

        let config = OptimizeConfig {
            max_width: 128,
            max_height: 128,
            ..OptimizeConfig::default()
        };
        let asset = optimize_image(&backend, &previews, &extracted, &config);
        assert!(!asset.fell_back);
        assert_eq!((asset.width, asset.height), (128, 128));
        let decoded = image::load_from_memory(&asset.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (128, 128));
    }
}
