//! Collaborator interfaces: document store, object store, identity provider.
//!
//! The pipeline only talks to these traits. Two implementations ship with
//! the crate:
//!
//! | Module | Backing | Used by |
//! |---|---|---|
//! | [`memory`] | in-process maps, with failure switches | embedding, tests |
//! | [`local`] | a data directory on disk | the `famille-photo` CLI |
//!
//! Documents carry an **etag**: the SHA-256 of their canonical JSON
//! serialization. [`DocumentStore::update_entity`] accepts the etag the
//! caller last saw and refuses the write with [`StoreError::Conflict`] when
//! the record changed in between.

pub mod local;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use local::{JsonDocumentStore, LocalIdentity, LocalObjectStore};
pub use memory::{MemoryDocumentStore, MemoryIdentity, MemoryObjectStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("{collection}/{id} was modified concurrently")]
    Conflict { collection: String, id: String },
    #[error("Invalid object path: {0}")]
    InvalidPath(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Record fields plus the etag they hash to.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub fields: Map<String, Value>,
    pub etag: String,
}

impl Document {
    pub fn new(fields: Map<String, Value>) -> Self {
        let etag = compute_etag(&fields);
        Self { fields, etag }
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// SHA-256 over the canonical (key-sorted) JSON form of the fields.
pub fn compute_etag(fields: &Map<String, Value>) -> String {
    let canonical = Value::Object(fields.clone()).to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// One object held by an [`ObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
}

/// Reject absolute paths and `..` segments in object keys.
pub fn validate_object_path(path: &str) -> Result<(), StoreError> {
    if path.is_empty()
        || path.starts_with('/')
        || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_entity(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Merge `fields` into an existing record.
    ///
    /// Fails with `NotFound` when the record does not exist and with
    /// `Conflict` when `expected_etag` is given and no longer matches.
    async fn update_entity(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        expected_etag: Option<&str>,
    ) -> Result<Document, StoreError>;

    /// All records of a collection, as `(id, document)` pairs.
    async fn list_entities(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `path` and return its durable URL.
    async fn put_object(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StoreError>;

    /// Remove an object. Removing a missing object is not an error.
    async fn delete_object(&self, path: &str) -> Result<(), StoreError>;

    async fn list_objects(&self, prefix: &str) -> Result<Vec<StoredObject>, StoreError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Id of the signed-in user, if any.
    async fn current_user_id(&self) -> Option<String>;

    /// Set the provider's own photo field for `user_id`.
    async fn update_profile_reference(&self, user_id: &str, url: &str) -> Result<(), StoreError>;
}

/// Shallow merge of `update` into `base`, used by both store implementations.
pub(crate) fn merge_fields(base: &mut Map<String, Value>, update: Map<String, Value>) {
    for (key, value) in update {
        base.insert(key, value);
    }
}
