//! Shared test utilities for the famille-photo test suite.
//!
//! Provides synthetic encoded images, ready-made [`SourceImage`] values, and
//! an in-memory set of collaborators wired to a notification bus.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let services = TestServices::with_user("u1");
//! let uploader = services.uploader(Arc::new(RustBackend::new()));
//! let jpeg = create_test_jpeg(2000, 1000);
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{Map, Value, json};
use std::io::Cursor;
use std::sync::Arc;

use crate::config::PhotoConfig;
use crate::imaging::ImageBackend;
use crate::notify::NotificationBus;
use crate::preview::PreviewRegistry;
use crate::session::{Collaborators, PhotoUploader};
use crate::store::{MemoryDocumentStore, MemoryIdentity, MemoryObjectStore};
use crate::types::{MEMBERS_COLLECTION, SourceImage, USERS_COLLECTION};

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

/// A gradient JPEG of the given size.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Jpeg)
}

/// A gradient PNG of the given size.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

// =========================================================================
// Source images
// =========================================================================

/// A `SourceImage` with placeholder bytes and a registered preview.
///
/// Only useful with `MockBackend`; the bytes are not a real image.
pub fn source_image(previews: &Arc<PreviewRegistry>, width: u32, height: u32) -> SourceImage {
    let bytes: Arc<[u8]> = Arc::from(vec![0u8; 16]);
    SourceImage {
        name: "test.jpg".into(),
        mime_type: "image/jpeg".into(),
        width,
        height,
        preview: Some(previews.register(Arc::clone(&bytes), "image/jpeg")),
        bytes,
    }
}

/// A `SourceImage` wrapping real encoded bytes.
pub fn source_image_from_bytes(previews: &Arc<PreviewRegistry>, bytes: Vec<u8>) -> SourceImage {
    let decoded = image::load_from_memory(&bytes).unwrap();
    let bytes: Arc<[u8]> = Arc::from(bytes);
    SourceImage {
        name: "real.jpg".into(),
        mime_type: "image/jpeg".into(),
        width: decoded.width(),
        height: decoded.height(),
        preview: Some(previews.register(Arc::clone(&bytes), "image/jpeg")),
        bytes,
    }
}

// =========================================================================
// Collaborators
// =========================================================================

pub fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// In-memory collaborators with a user `u1`-style record already present.
pub struct TestServices {
    pub documents: Arc<MemoryDocumentStore>,
    pub objects: Arc<MemoryObjectStore>,
    pub identity: Arc<MemoryIdentity>,
    pub bus: Arc<NotificationBus>,
}

impl TestServices {
    /// Services with a signed-in user whose record exists, plus family
    /// member `m1` of family `f1`.
    pub fn with_user(user_id: &str) -> Self {
        let documents = MemoryDocumentStore::new();
        documents.insert(
            USERS_COLLECTION,
            user_id,
            fields(json!({"firstName": "Ada", "profilePicture": "https://old.example/ada.jpg"})),
        );
        documents.insert(MEMBERS_COLLECTION, "m1", fields(json!({"firstName": "Leo"})));
        Self {
            documents: Arc::new(documents),
            objects: Arc::new(MemoryObjectStore::new("https://storage.test")),
            identity: Arc::new(MemoryIdentity::signed_in(user_id)),
            bus: Arc::new(NotificationBus::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            documents: self.documents.clone(),
            objects: self.objects.clone(),
            identity: self.identity.clone(),
            notifier: self.bus.clone(),
        }
    }

    pub fn uploader(&self, backend: Arc<dyn ImageBackend>) -> PhotoUploader {
        PhotoUploader::new(PhotoConfig::default(), backend, self.collaborators())
    }
}
