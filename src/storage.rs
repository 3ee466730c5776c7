//! Blob storage collaborator boundary.
//!
//! The service never handles raw bytes. Clients upload directly to the
//! storage provider via a short-lived URL and hand back the opaque reference,
//! which is the only thing persisted here.

use std::fmt;

use uuid::Uuid;

pub trait BlobStore: Send + Sync {
    /// Mints a one-shot upload URL and the storage reference the client must
    /// report back once the upload completes.
    fn generate_upload_url(&self) -> UploadTicket;

    /// Resolves a stored reference to a serveable URL. Returns `None` if the
    /// reference is unknown to the provider.
    fn get_url(&self, storage_ref: &str) -> Option<String>;

    /// Deletes the blob behind a reference. Unknown references are ignored.
    fn delete(&self, storage_ref: &str);
}

#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub upload_url: String,
    pub storage_ref: String,
}

/// Development stand-in that fabricates provider-shaped URLs without a real
/// backend. Replaced by the actual storage client in deployment.
pub struct DevBlobStore {
    base_url: String,
}

impl DevBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for DevBlobStore {
    fn default() -> Self {
        Self::new("https://storage.invalid")
    }
}

impl fmt::Debug for DevBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevBlobStore")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BlobStore for DevBlobStore {
    fn generate_upload_url(&self) -> UploadTicket {
        let storage_ref = Uuid::new_v4().to_string();
        UploadTicket {
            upload_url: format!("{}/upload/{}", self.base_url, storage_ref),
            storage_ref,
        }
    }

    fn get_url(&self, storage_ref: &str) -> Option<String> {
        Some(format!("{}/blobs/{}", self.base_url, storage_ref))
    }

    fn delete(&self, storage_ref: &str) {
        tracing::debug!(storage_ref = %storage_ref, "Deleted blob");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_tickets_are_unique() {
        let store = DevBlobStore::default();
        let a = store.generate_upload_url();
        let b = store.generate_upload_url();
        assert_ne!(a.storage_ref, b.storage_ref);
        assert!(a.upload_url.contains(&a.storage_ref));
    }

    #[test]
    fn get_url_embeds_reference() {
        let store = DevBlobStore::new("https://cdn.example.com");
        let url = store.get_url("abc123").unwrap();
        assert_eq!(url, "https://cdn.example.com/blobs/abc123");
    }
}
