//! Image loader: validate a selected file and decode its dimensions.
//!
//! Only `image/*` files are accepted. The declared MIME type is checked
//! before any bytes are decoded, so a rejected file never produces a
//! [`SourceImage`] or a preview handle.

use crate::error::PipelineError;
use crate::imaging::ImageBackend;
use crate::preview::PreviewRegistry;
use crate::types::{SelectedFile, SourceImage};
use std::sync::Arc;
use tracing::debug;

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

/// Validate and identify `file`, registering a preview handle for it.
pub fn load_image(
    backend: &dyn ImageBackend,
    previews: &Arc<PreviewRegistry>,
    file: SelectedFile,
) -> Result<SourceImage, PipelineError> {
    if !is_image_mime(&file.mime_type) {
        return Err(PipelineError::InvalidFormat {
            mime_type: file.mime_type,
        });
    }

    let dims = backend
        .identify(&file.bytes)
        .map_err(|e| PipelineError::DecodeFailed(e.to_string()))?;
    if dims.width == 0 || dims.height == 0 {
        return Err(PipelineError::DecodeFailed(format!(
            "{} has no pixels",
            file.name
        )));
    }
    debug!(
        name = %file.name,
        width = dims.width,
        height = dims.height,
        "decoded source image"
    );

    let bytes: Arc<[u8]> = Arc::from(file.bytes);
    let preview = previews.register(Arc::clone(&bytes), &file.mime_type);
    Ok(SourceImage {
        name: file.name,
        mime_type: file.mime_type,
        width: dims.width,
        height: dims.height,
        bytes,
        preview: Some(preview),
    })
}
