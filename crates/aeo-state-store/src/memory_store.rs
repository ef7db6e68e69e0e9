//! In-memory blob store for development and testing

use aeo_core::{BlobRef, BlobStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Map-backed [`BlobStore`]; contents are lost when dropped
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<BlobRef, Value>>,
    reads: AtomicUsize,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Number of `get` calls served so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(
        &self,
        tenant_id: &str,
        job_id: &str,
        agent_id: &str,
        data: &Value,
    ) -> aeo_core::Result<BlobRef> {
        let key = BlobRef::new(tenant_id, job_id, agent_id);
        self.blobs.write().await.insert(key.clone(), data.clone());
        Ok(key)
    }

    async fn get(
        &self,
        tenant_id: &str,
        job_id: &str,
        agent_id: &str,
    ) -> aeo_core::Result<Option<Value>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let key = BlobRef::new(tenant_id, job_id, agent_id);
        Ok(self.blobs.read().await.get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_and_overwrite() {
        let store = InMemoryBlobStore::new();
        let key = store
            .put("t1", "j1", "page-analysis", &json!({"title": "Home"}))
            .await
            .unwrap();
        assert_eq!(key.as_str(), "t1/j1/page-analysis");

        store
            .put("t1", "j1", "page-analysis", &json!({"title": "Rerun"}))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);

        let got = store.get("t1", "j1", "page-analysis").await.unwrap();
        assert_eq!(got, Some(json!({"title": "Rerun"})));
        assert_eq!(store.get("t2", "j1", "page-analysis").await.unwrap(), None);
        assert_eq!(store.read_count(), 2);
    }

    #[tokio::test]
    async fn test_slashes_in_ids_do_not_collide() {
        let store = InMemoryBlobStore::new();
        store.put("acme/x", "job", "a", &json!("acme secret")).await.unwrap();
        store.put("acme", "x/job", "a", &json!("other tenant")).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(
            store.get("acme/x", "job", "a").await.unwrap(),
            Some(json!("acme secret"))
        );
        assert_eq!(
            store.get("acme", "x/job", "a").await.unwrap(),
            Some(json!("other tenant"))
        );
    }
}
