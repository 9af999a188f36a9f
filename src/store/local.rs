//! Filesystem-backed collaborators used by the CLI.
//!
//! ```text
//! <data-dir>/
//! ├── objects/                         # LocalObjectStore root
//! │   └── profile_pictures/u1/profile_u1_1730000000000.jpg
//! ├── records/                         # JsonDocumentStore root
//! │   ├── users/u1.json
//! │   └── familyMembers/m1.json
//! └── identity/u1.json                 # LocalIdentity profiles
//! ```
//!
//! Document writes go through a temp file and a rename so a crash never
//! leaves a half-written record. There is no cross-process lock; concurrent
//! writers are caught by the etag check instead.

use super::{
    Document, DocumentStore, IdentityProvider, ObjectStore, StoreError, StoredObject,
    merge_fields, validate_object_path,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

async fn read_fields(path: &Path) -> Result<Option<Map<String, Value>>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_fields(path: &Path, fields: &Map<String, Value>) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, serde_json::to_string_pretty(fields)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Objects stored as plain files under `root`.
///
/// URLs are `{public_base_url}/{path}` when a base URL is configured and
/// `file://` URLs otherwise.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    fn url_for(&self, path: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/{path}"),
            None => format!("file://{}", self.root.join(path).display()),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_object(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StoreError> {
        validate_object_path(path)?;
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        tracing::debug!(path, content_type, size = bytes.len(), "object stored");
        Ok(self.url_for(path))
    }

    async fn delete_object(&self, path: &str) -> Result<(), StoreError> {
        validate_object_path(path)?;
        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<StoredObject>, StoreError> {
        let root = self.root.clone();
        let paths = tokio::task::spawn_blocking(move || -> Result<Vec<String>, StoreError> {
            if !root.exists() {
                return Ok(Vec::new());
            }
            let mut paths = Vec::new();
            for entry in WalkDir::new(&root).sort_by_file_name() {
                let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Ok(rel) = entry.path().strip_prefix(&root) {
                    let key = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    paths.push(key);
                }
            }
            Ok(paths)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("object listing aborted: {e}")))??;

        Ok(paths
            .into_iter()
            .filter(|p| p.starts_with(prefix))
            .map(|path| StoredObject {
                url: self.url_for(&path),
                path,
            })
            .collect())
    }
}

/// One JSON file per record: `<root>/<collection>/<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonDocumentStore {
    root: PathBuf,
}

impl JsonDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, collection: &str, id: &str) -> Result<PathBuf, StoreError> {
        validate_object_path(collection)?;
        validate_object_path(id)?;
        if id.contains('/') {
            return Err(StoreError::InvalidPath(id.to_string()));
        }
        Ok(self.root.join(collection).join(format!("{id}.json")))
    }

    /// Create an empty record unless one already exists.
    pub async fn ensure_entity(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        if read_fields(&path).await?.is_none() {
            write_fields(&path, &Map::new()).await?;
            tracing::info!(collection, id, "created empty record");
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonDocumentStore {
    async fn get_entity(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let path = self.record_path(collection, id)?;
        Ok(read_fields(&path).await?.map(Document::new))
    }

    async fn update_entity(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        expected_etag: Option<&str>,
    ) -> Result<Document, StoreError> {
        let path = self.record_path(collection, id)?;
        let mut record = read_fields(&path).await?.ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        if expected_etag.is_some_and(|expected| Document::new(record.clone()).etag != expected) {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        merge_fields(&mut record, fields);
        write_fields(&path, &record).await?;
        Ok(Document::new(record))
    }

    async fn list_entities(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        validate_object_path(collection)?;
        let dir = self.root.join(collection);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if let Some(fields) = read_fields(&path).await? {
                records.push((id, Document::new(fields)));
            }
        }
        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }
}

/// Identity profiles as `<root>/<uid>.json`, with one signed-in user.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    root: PathBuf,
    current_user: Option<String>,
}

impl LocalIdentity {
    pub fn new(root: impl Into<PathBuf>, current_user: Option<String>) -> Self {
        Self {
            root: root.into(),
            current_user,
        }
    }

    pub async fn photo_url(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let path = self.root.join(format!("{user_id}.json"));
        Ok(read_fields(&path)
            .await?
            .and_then(|f| f.get("photoURL").and_then(Value::as_str).map(str::to_string)))
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn current_user_id(&self) -> Option<String> {
        self.current_user.clone()
    }

    async fn update_profile_reference(&self, user_id: &str, url: &str) -> Result<(), StoreError> {
        validate_object_path(user_id)?;
        let path = self.root.join(format!("{user_id}.json"));
        let mut profile = read_fields(&path).await?.unwrap_or_default();
        profile.insert("uid".into(), Value::String(user_id.to_string()));
        profile.insert("photoURL".into(), Value::String(url.to_string()));
        write_fields(&path, &profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn object_store_writes_files_and_urls() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path(), Some("https://cdn.example/".into()));

        let url = store
            .put_object("profile_pictures/u1/a.jpg", b"jpeg", "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/profile_pictures/u1/a.jpg");
        assert_eq!(
            std::fs::read(tmp.path().join("profile_pictures/u1/a.jpg")).unwrap(),
            b"jpeg"
        );
    }

    #[tokio::test]
    async fn object_store_file_urls_without_base() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path(), None);
        let url = store.put_object("a/b.png", b"png", "image/png").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("a/b.png"));
    }

    #[tokio::test]
    async fn object_store_rejects_escaping_paths() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path(), None);
        let result = store.put_object("../evil.jpg", b"x", "image/jpeg").await;
        assert!(matches!(result, Err(StoreError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn object_store_lists_by_prefix_and_deletes() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path(), None);
        store.put_object("profile_pictures/u1/a.jpg", b"1", "image/jpeg").await.unwrap();
        store.put_object("family_members/f1/m1/b.jpg", b"2", "image/jpeg").await.unwrap();

        let listed = store.list_objects("profile_pictures/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "profile_pictures/u1/a.jpg");

        store.delete_object("profile_pictures/u1/a.jpg").await.unwrap();
        store.delete_object("profile_pictures/u1/a.jpg").await.unwrap();
        assert!(store.list_objects("profile_pictures/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn object_store_lists_nothing_when_root_missing() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path().join("absent"), None);
        assert!(store.list_objects("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn document_store_roundtrip_and_conflict() {
        let tmp = TempDir::new().unwrap();
        let store = JsonDocumentStore::new(tmp.path());
        assert!(store.get_entity("users", "u1").await.unwrap().is_none());

        store.ensure_entity("users", "u1").await.unwrap();
        let doc = store.get_entity("users", "u1").await.unwrap().unwrap();
        assert!(doc.fields.is_empty());

        let updated = store
            .update_entity("users", "u1", fields(json!({"profilePicture": "a"})), Some(&doc.etag))
            .await
            .unwrap();
        assert_eq!(updated.get_str("profilePicture"), Some("a"));

        let stale = store
            .update_entity("users", "u1", fields(json!({"profilePicture": "b"})), Some(&doc.etag))
            .await;
        assert!(matches!(stale, Err(StoreError::Conflict { .. })));

        let reread = store.get_entity("users", "u1").await.unwrap().unwrap();
        assert_eq!(reread.get_str("profilePicture"), Some("a"));
        assert_eq!(reread.etag, updated.etag);
    }

    #[tokio::test]
    async fn document_store_update_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = JsonDocumentStore::new(tmp.path());
        let result = store
            .update_entity("familyMembers", "m1", fields(json!({"a": 1})), None)
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn document_store_lists_collection() {
        let tmp = TempDir::new().unwrap();
        let store = JsonDocumentStore::new(tmp.path());
        store.ensure_entity("users", "b").await.unwrap();
        store.ensure_entity("users", "a").await.unwrap();
        store.ensure_entity("familyMembers", "m").await.unwrap();

        let ids: Vec<String> = store
            .list_entities("users")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn identity_writes_photo_url() {
        let tmp = TempDir::new().unwrap();
        let identity = LocalIdentity::new(tmp.path(), Some("u1".into()));
        assert_eq!(identity.current_user_id().await.as_deref(), Some("u1"));

        identity.update_profile_reference("u1", "https://x/y.jpg").await.unwrap();
        assert_eq!(
            identity.photo_url("u1").await.unwrap().as_deref(),
            Some("https://x/y.jpg")
        );
    }
}
