use serde_yaml::Mapping;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::ConsolidatedDocument;

/// Shared, serialized access to the document being built during a run.
///
/// Cheaply cloneable. Every merge holds the lock for the whole entry, so two
/// items writing concurrently can never interleave their fields.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    inner: Arc<Mutex<ConsolidatedDocument>>,
}

impl DocumentHandle {
    pub fn new(document: ConsolidatedDocument) -> Self {
        Self {
            inner: Arc::new(Mutex::new(document)),
        }
    }

    pub async fn merge_entry(&self, key: &str, fields: Mapping) {
        self.inner.lock().await.merge_entry(key, fields);
    }

    pub async fn entry(&self, key: &str) -> Option<Mapping> {
        self.inner.lock().await.entry(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of the document as it stands now.
    pub async fn snapshot(&self) -> ConsolidatedDocument {
        self.inner.lock().await.clone()
    }
}
