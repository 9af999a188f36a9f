//! Transient preview handles for in-memory image buffers.
//!
//! A [`PreviewHandle`] is the local equivalent of a browser object URL: a
//! `blob:` reference that resolves to bytes held in a [`PreviewRegistry`].
//! Handles are released explicitly with [`PreviewHandle::revoke`] or
//! implicitly on drop, so a session can never leak one past its own
//! lifetime. [`PreviewRegistry::live_count`] exposes the number of
//! outstanding handles for leak checks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use uuid::Uuid;

const URL_SCHEME: &str = "blob:famille-photo/";

struct Entry {
    bytes: Arc<[u8]>,
    mime_type: String,
}

/// Registry of live preview buffers, keyed by handle id.
#[derive(Default)]
pub struct PreviewRegistry {
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl PreviewRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a buffer and mint a handle for it.
    pub fn register(self: &Arc<Self>, bytes: Arc<[u8]>, mime_type: &str) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.entries().insert(
            id,
            Entry {
                bytes,
                mime_type: mime_type.to_string(),
            },
        );
        tracing::debug!(%id, mime_type, "preview registered");
        PreviewHandle {
            id,
            url: format!("{URL_SCHEME}{id}"),
            registry: Arc::downgrade(self),
        }
    }

    /// Resolve a `blob:` URL to its bytes and MIME type while the handle lives.
    pub fn resolve(&self, url: &str) -> Option<(Arc<[u8]>, String)> {
        let id = url.strip_prefix(URL_SCHEME)?.parse::<Uuid>().ok()?;
        self.entries()
            .get(&id)
            .map(|e| (Arc::clone(&e.bytes), e.mime_type.clone()))
    }

    /// Number of handles not yet released.
    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    fn release(&self, id: Uuid) {
        if self.entries().remove(&id).is_some() {
            tracing::debug!(%id, "preview released");
        }
    }
}

/// Owned reference to a registered preview buffer.
///
/// Not `Clone`: exactly one owner is responsible for releasing it.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    url: String,
    registry: Weak<PreviewRegistry>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Release the buffer now. Equivalent to dropping the handle.
    pub fn revoke(self) {}
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(self.id);
        }
    }
}

impl std::fmt::Debug for PreviewRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}
