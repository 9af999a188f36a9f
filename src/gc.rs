//! Orphan sweep: delete stored photos that no record points at.
//!
//! Compensation in the session covers the common case (record write fails
//! right after upload). This sweep catches what it cannot: crashes between
//! upload and sync, failed compensating deletes, and superseded photos left
//! behind by a newer upload.
//!
//! An object is kept when its URL equals the `profilePicture` of any record
//! in `users` or `familyMembers`. Only objects under the configured profile
//! and member prefixes are considered.

use crate::config::StorageConfig;
use crate::store::{DocumentStore, ObjectStore, StoreError, StoredObject};
use crate::sync::PICTURE_FIELD;
use crate::types::{MEMBERS_COLLECTION, USERS_COLLECTION};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

/// Outcome of one sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Objects that are still referenced.
    pub kept: usize,
    /// Objects no record references.
    pub orphans: Vec<StoredObject>,
    /// Whether the orphans were actually deleted.
    pub deleted: bool,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.kept + self.orphans.len()
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.deleted { "deleted" } else { "would delete" };
        write!(
            f,
            "{} kept, {} {} ({} total)",
            self.kept,
            verb,
            self.orphans.len(),
            self.total()
        )
    }
}

async fn referenced_urls(documents: &dyn DocumentStore) -> Result<HashSet<String>, StoreError> {
    let mut urls = HashSet::new();
    for collection in [USERS_COLLECTION, MEMBERS_COLLECTION] {
        for (_, doc) in documents.list_entities(collection).await? {
            if let Some(url) = doc.get_str(PICTURE_FIELD) {
                urls.insert(url.to_string());
            }
        }
    }
    Ok(urls)
}

/// Find, and unless `dry_run` delete, unreferenced photo objects.
pub async fn sweep_orphans(
    documents: &dyn DocumentStore,
    objects: &dyn ObjectStore,
    storage: &StorageConfig,
    dry_run: bool,
) -> Result<SweepReport, StoreError> {
    let referenced = referenced_urls(documents).await?;
    let mut report = SweepReport {
        deleted: !dry_run,
        ..SweepReport::default()
    };

    for prefix in [&storage.profile_prefix, &storage.member_prefix] {
        for object in objects.list_objects(&format!("{prefix}/")).await? {
            if referenced.contains(&object.url) {
                report.kept += 1;
                continue;
            }
            if dry_run {
                debug!(path = %object.path, "orphan found");
            } else {
                objects.delete_object(&object.path).await?;
                info!(path = %object.path, "orphan deleted");
            }
            report.orphans.push(object);
        }
    }
    Ok(report)
}
