//! Pipeline-level errors.
//!
//! Every error that aborts a crop session is a [`PipelineError`]. Stage
//! modules keep their own error enums (`BackendError`, `StoreError`,
//! `EditorError`) and the session maps them here at the stage boundary, so
//! the variant says *which stage* failed and the source says *why*.
//!
//! Optimizer failures never show up here: the optimizer logs them and falls
//! back to the unoptimized crop.

use crate::editor::EditorError;
use crate::imaging::BackendError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unsupported file type '{mime_type}': please choose an image")]
    InvalidFormat { mime_type: String },
    #[error("Image could not be decoded: {0}")]
    DecodeFailed(String),
    #[error("Crop extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("Upload failed: {0}")]
    UploadFailed(#[source] StoreError),
    #[error("Saving the photo reference failed: {0}")]
    MetadataSyncFailed(#[source] StoreError),
    #[error("Another photo session is already in progress")]
    SessionBusy,
    #[error(transparent)]
    Editor(#[from] EditorError),
}

impl PipelineError {
    /// Short title for the error notification.
    pub fn title(&self) -> &'static str {
        match self {
            PipelineError::InvalidFormat { .. } => "Invalid format",
            PipelineError::DecodeFailed(_) => "Image could not be loaded",
            PipelineError::ExtractionFailed(_) | PipelineError::Editor(_) => "Crop failed",
            PipelineError::UploadFailed(_) => "Upload failed",
            PipelineError::MetadataSyncFailed(_) => "Photo update failed",
            PipelineError::SessionBusy => "Upload in progress",
        }
    }

    /// True when the record write was refused because the record changed.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            PipelineError::MetadataSyncFailed(StoreError::Conflict { .. })
        )
    }
}

impl From<BackendError> for PipelineError {
    fn from(err: BackendError) -> Self {
        PipelineError::ExtractionFailed(err.to_string())
    }
}
