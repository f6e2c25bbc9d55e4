//! Nullable content-addressed store.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tidemark_gateways::{ContentStore, GatewayError};
use tidemark_types::ContentId;

/// Deterministic in-memory content store double.
///
/// Content ids are sequential (`cid-1`, `cid-2`, ...), not hashes; the
/// orchestrator treats them as opaque either way.
#[derive(Default)]
pub struct NullContentStore {
    seq: AtomicU64,
    blobs: Mutex<HashMap<ContentId, Vec<u8>>>,
    pinned: Mutex<HashSet<ContentId>>,
    failures: Mutex<VecDeque<GatewayError>>,
}

impl NullContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: GatewayError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn is_pinned(&self, id: &ContentId) -> bool {
        self.pinned.lock().unwrap().contains(id)
    }

    fn take_failure(&self) -> Option<GatewayError> {
        self.failures.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl ContentStore for NullContentStore {
    async fn put(&self, bytes: &[u8]) -> Result<ContentId, GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let id = ContentId::new(format!("cid-{n}"));
        self.blobs.lock().unwrap().insert(id.clone(), bytes.to_vec());
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> Result<Vec<u8>, GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.blobs
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn pin(&self, id: &ContentId) -> Result<(), GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        if !self.blobs.lock().unwrap().contains_key(id) {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        self.pinned.lock().unwrap().insert(id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_round_trip() {
        let store = NullContentStore::new();
        let id = store.put(b"field photo").await.unwrap();
        assert_eq!(id.as_str(), "cid-1");
        assert_eq!(store.get(&id).await.unwrap(), b"field photo");
    }

    #[tokio::test]
    async fn pin_requires_an_existing_blob() {
        let store = NullContentStore::new();
        let missing = ContentId::new("cid-99");
        assert!(store.pin(&missing).await.is_err());

        let id = store.put(b"data").await.unwrap();
        store.pin(&id).await.unwrap();
        assert!(store.is_pinned(&id));
    }
}
