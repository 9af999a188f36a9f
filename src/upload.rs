//! Upload adapter: store an optimized asset under an entity-namespaced key.
//!
//! Keys look like
//!
//! ```text
//! profile_pictures/{userId}/profile_{userId}_{ts}.jpg
//! family_members/{familyId}/{memberId}/member_{memberId}_{ts}.jpg
//! ```
//!
//! `ts` is a millisecond timestamp that never repeats within the process, so
//! two uploads for the same entity always land on distinct keys.

use crate::config::StorageConfig;
use crate::error::PipelineError;
use crate::store::ObjectStore;
use crate::types::{OptimizedAsset, RemoteAsset, TargetEntity};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Current time in milliseconds, bumped past the previous value if the clock
/// has not advanced.
pub fn next_timestamp_millis() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let previous = LAST_TIMESTAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(previous + 1)
}

/// Object key for `target` at timestamp `ts`.
pub fn object_path(
    storage: &StorageConfig,
    target: &TargetEntity,
    ts: i64,
    extension: &str,
) -> String {
    match target {
        TargetEntity::UserProfile { user_id } => format!(
            "{}/{user_id}/profile_{user_id}_{ts}.{extension}",
            storage.profile_prefix
        ),
        TargetEntity::FamilyMember {
            family_id,
            member_id,
        } => format!(
            "{}/{family_id}/{member_id}/member_{member_id}_{ts}.{extension}",
            storage.member_prefix
        ),
    }
}

/// Put the asset in the object store. Nothing else is written.
pub async fn upload_asset(
    objects: &dyn ObjectStore,
    target: &TargetEntity,
    asset: &OptimizedAsset,
    storage: &StorageConfig,
) -> Result<RemoteAsset, PipelineError> {
    let path = object_path(
        storage,
        target,
        next_timestamp_millis(),
        asset.format.extension(),
    );
    let url = objects
        .put_object(&path, &asset.bytes, asset.mime_type())
        .await
        .map_err(PipelineError::UploadFailed)?;
    info!(%path, bytes = asset.bytes.len(), "uploaded photo");
    Ok(RemoteAsset { url, path })
}
