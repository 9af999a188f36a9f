//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend must
//! support: identify, crop, and resize. All of them work on in-memory encoded
//! buffers; nothing here touches the filesystem.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust, built on the
//! `image` crate.

use super::params::{CropParams, OutputFormat, ResizeParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Encode failed: {0}")]
    EncodeFailed(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// An encoded image produced by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Every backend must implement all three operations so the rest of the
/// codebase is backend-agnostic.
pub trait ImageBackend: Send + Sync {
    /// Read image dimensions from an encoded buffer.
    fn identify(&self, data: &[u8]) -> Result<Dimensions, BackendError>;

    /// Copy a rectangle out of the source and encode it at the exact output size.
    fn crop(&self, params: &CropParams<'_>) -> Result<EncodedImage, BackendError>;

    /// Re-render the source at the given size and re-encode it.
    fn resize(&self, params: &ResizeParams<'_>) -> Result<EncodedImage, BackendError>;
}
