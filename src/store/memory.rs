//! In-process collaborators.
//!
//! Each store has a failure switch (`set_failing`) that makes its write path
//! return [`StoreError::Unavailable`], so callers can exercise the pipeline's
//! failure handling without a network.

use super::{
    Document, DocumentStore, IdentityProvider, ObjectStore, StoreError, StoredObject,
    merge_fields, validate_object_path,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    records: Mutex<BTreeMap<(String, String), Map<String, Value>>>,
    failing: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a record.
    pub fn insert(&self, collection: &str, id: &str, fields: Map<String, Value>) {
        lock(&self.records).insert((collection.to_string(), id.to_string()), fields);
    }

    /// Read one field without going through the async trait.
    pub fn field(&self, collection: &str, id: &str, field: &str) -> Option<Value> {
        lock(&self.records)
            .get(&(collection.to_string(), id.to_string()))
            .and_then(|r| r.get(field).cloned())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_entity(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(lock(&self.records)
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
            .map(Document::new))
    }

    async fn update_entity(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        expected_etag: Option<&str>,
    ) -> Result<Document, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("document store offline".into()));
        }
        let mut records = lock(&self.records);
        let record = records
            .get_mut(&(collection.to_string(), id.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        if expected_etag.is_some_and(|expected| Document::new(record.clone()).etag != expected) {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        merge_fields(record, fields);
        Ok(Document::new(record.clone()))
    }

    async fn list_entities(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        Ok(lock(&self.records)
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), fields)| (id.clone(), Document::new(fields.clone())))
            .collect())
    }
}

/// Object store keeping bytes in memory; URLs are `{base_url}/{path}`.
pub struct MemoryObjectStore {
    base_url: String,
    objects: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
    failing: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(BTreeMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn object(&self, path: &str) -> Option<(Vec<u8>, String)> {
        lock(&self.objects).get(path).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://objects")
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StoreError> {
        validate_object_path(path)?;
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("object store offline".into()));
        }
        lock(&self.objects).insert(path.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(self.url_for(path))
    }

    async fn delete_object(&self, path: &str) -> Result<(), StoreError> {
        lock(&self.objects).remove(path);
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<StoredObject>, StoreError> {
        Ok(lock(&self.objects)
            .keys()
            .filter(|p| p.starts_with(prefix))
            .map(|p| StoredObject {
                path: p.clone(),
                url: self.url_for(p),
            })
            .collect())
    }
}

/// Identity provider with a fixed signed-in user.
#[derive(Default)]
pub struct MemoryIdentity {
    current_user: Option<String>,
    photo_urls: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            current_user: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn photo_url(&self, user_id: &str) -> Option<String> {
        lock(&self.photo_urls).get(user_id).cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn current_user_id(&self) -> Option<String> {
        self.current_user.clone()
    }

    async fn update_profile_reference(&self, user_id: &str, url: &str) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("identity provider offline".into()));
        }
        lock(&self.photo_urls).insert(user_id.to_string(), url.to_string());
        Ok(())
    }
}
