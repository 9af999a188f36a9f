//! Metadata sync: record the uploaded URL on the target entity.
//!
//! Two writes, in order:
//!
//! 1. **Primary**: the document store record gets `profilePicture` and
//!    `updatedAt`. This write must succeed; its failure aborts the session.
//! 2. **Secondary**: for a user profile whose id is the signed-in user, the
//!    identity provider's own photo field. Failure is logged and reported in
//!    [`SyncOutcome::identity_synced`], nothing more.

use crate::error::PipelineError;
use crate::store::{Document, DocumentStore, IdentityProvider};
use crate::types::{RemoteAsset, TargetEntity};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Record field holding the photo URL.
pub const PICTURE_FIELD: &str = "profilePicture";
/// Record field holding the RFC 3339 time of the last photo change.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The record as written.
    pub document: Document,
    /// Whether the identity provider now carries the same URL. Always false
    /// for family members.
    pub identity_synced: bool,
}

fn photo_fields(url: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(PICTURE_FIELD.to_string(), Value::String(url.to_string()));
    fields.insert(
        UPDATED_AT_FIELD.to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    fields
}

/// Write `remote` into the target's record, then mirror it to the identity
/// provider when the target is the signed-in user.
///
/// With `expected_etag`, the primary write is refused if the record changed
/// since that etag was read.
pub async fn sync_metadata(
    documents: &dyn DocumentStore,
    identity: &dyn IdentityProvider,
    target: &TargetEntity,
    remote: &RemoteAsset,
    expected_etag: Option<&str>,
) -> Result<SyncOutcome, PipelineError> {
    let document = documents
        .update_entity(
            target.collection(),
            target.record_id(),
            photo_fields(&remote.url),
            expected_etag,
        )
        .await
        .map_err(PipelineError::MetadataSyncFailed)?;
    info!(entity = %target, url = %remote.url, "photo reference saved");

    let identity_synced = match target {
        TargetEntity::UserProfile { user_id } => {
            sync_identity(identity, user_id, &remote.url).await
        }
        TargetEntity::FamilyMember { .. } => false,
    };

    Ok(SyncOutcome {
        document,
        identity_synced,
    })
}

async fn sync_identity(identity: &dyn IdentityProvider, user_id: &str, url: &str) -> bool {
    if identity.current_user_id().await.as_deref() != Some(user_id) {
        debug!(user_id, "not the signed-in user, identity provider left alone");
        return false;
    }
    match identity.update_profile_reference(user_id, url).await {
        Ok(()) => true,
        Err(err) => {
            warn!(user_id, error = %err, "identity provider photo update failed");
            false
        }
    }
}
