//! Shared types passed between pipeline stages.
//!
//! ```text
//! SelectedFile → SourceImage → ExtractedBlob → OptimizedAsset → RemoteAsset
//! ```
//!
//! Every stage consumes the previous stage's value and produces the next one;
//! none of them is mutated after creation except [`SourceImage`], whose
//! preview handle is released when the crop session ends.

use crate::imaging::OutputFormat;
use crate::preview::PreviewHandle;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Document-store collection holding user profiles.
pub const USERS_COLLECTION: &str = "users";
/// Document-store collection holding family members.
pub const MEMBERS_COLLECTION: &str = "familyMembers";

/// A file picked by the user, not yet validated.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    /// Declared MIME type (from the file picker, or guessed from the extension).
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }
}

/// A decoded user image, alive for one crop session.
#[derive(Debug)]
pub struct SourceImage {
    pub name: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub(crate) bytes: Arc<[u8]>,
    pub(crate) preview: Option<PreviewHandle>,
}

impl SourceImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn natural_dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `blob:` URL of the source, until [`release`](Self::release) is called.
    pub fn preview_url(&self) -> Option<&str> {
        self.preview.as_ref().map(|p| p.url())
    }

    /// Release the transient preview handle. Idempotent.
    pub fn release(&mut self) {
        if let Some(handle) = self.preview.take() {
            handle.revoke();
        }
    }
}

/// Raster copy of the confirmed crop, encoded at the selection's pixel size.
#[derive(Debug, Clone)]
pub struct ExtractedBlob {
    pub bytes: Arc<[u8]>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl ExtractedBlob {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Buffer ready for upload, with a local preview reference.
#[derive(Debug)]
pub struct OptimizedAsset {
    pub bytes: Arc<[u8]>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub preview: PreviewHandle,
    /// The optimizer failed and this is the unmodified extracted blob.
    pub fell_back: bool,
}

impl OptimizedAsset {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Durable reference returned by the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    pub url: String,
    /// Object path the asset was stored under (used for compensation).
    pub path: String,
}

/// The record that ends up holding the photo reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetEntity {
    UserProfile { user_id: String },
    FamilyMember { family_id: String, member_id: String },
}

impl TargetEntity {
    pub fn user(user_id: impl Into<String>) -> Self {
        TargetEntity::UserProfile {
            user_id: user_id.into(),
        }
    }

    pub fn member(family_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        TargetEntity::FamilyMember {
            family_id: family_id.into(),
            member_id: member_id.into(),
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            TargetEntity::UserProfile { .. } => USERS_COLLECTION,
            TargetEntity::FamilyMember { .. } => MEMBERS_COLLECTION,
        }
    }

    /// Document id of the record within [`collection`](Self::collection).
    pub fn record_id(&self) -> &str {
        match self {
            TargetEntity::UserProfile { user_id } => user_id,
            TargetEntity::FamilyMember { member_id, .. } => member_id,
        }
    }
}

impl fmt::Display for TargetEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetEntity::UserProfile { user_id } => write!(f, "user {user_id}"),
            TargetEntity::FamilyMember {
                family_id,
                member_id,
            } => write!(f, "member {member_id} of family {family_id}"),
        }
    }
}
