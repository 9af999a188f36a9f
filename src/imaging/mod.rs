//! Image processing in pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Crop** | `crop_imm` (+ CatmullRom for residual scale) |
//! | **Optimize** | Lanczos3 + JPEG / PNG / WebP / AVIF encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop geometry and bounded dimensions (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, EncodedImage, ImageBackend};
pub use calculations::{
    PercentRect, calculate_bounded_dimensions, center_aspect_rect, clamp_rect, percent_to_pixels,
    scale_about_center, scale_crop_to_natural,
};
pub use operations::{extract_crop, optimize_image, plan_crop};
pub use params::{CropParams, OutputFormat, PixelRect, Quality, ResizeParams};
pub use rust_backend::RustBackend;
