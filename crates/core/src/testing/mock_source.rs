//! Mock metadata source for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::fixtures::jitter_delay;
use crate::catalog::{ItemHandle, LookupCaches, MediaKind, MetadataRecord, MetadataSource, SourceError};

/// Mock implementation of the MetadataSource trait.
///
/// Provides controllable behavior for testing:
/// - Records keyed by rating key (unknown keys resolve to `NotFound`)
/// - Per-key failures
/// - Per-key or jittered resolution delays
/// - Movie lookups go through the movie cache when one is supplied
#[derive(Debug, Default)]
pub struct MockMetadataSource {
    records: Arc<RwLock<HashMap<String, MetadataRecord>>>,
    failures: Arc<RwLock<HashMap<String, SourceError>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    /// `(seed, max_ms)` for jittered delays.
    jitter: Arc<RwLock<Option<(u64, u64)>>>,
    resolutions: AtomicUsize,
}

impl MockMetadataSource {
    /// Create an empty mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source that resolves the given records.
    pub async fn with_records(records: impl IntoIterator<Item = MetadataRecord>) -> Self {
        let source = Self::new();
        for record in records {
            source.add_record(record).await;
        }
        source
    }

    /// Add or replace a record.
    pub async fn add_record(&self, record: MetadataRecord) {
        self.records
            .write()
            .await
            .insert(record.rating_key.clone(), record);
    }

    /// Make resolving `rating_key` fail.
    pub async fn fail_key(&self, rating_key: &str, error: SourceError) {
        self.failures
            .write()
            .await
            .insert(rating_key.to_string(), error);
    }

    /// Delay resolving `rating_key`.
    pub async fn set_delay(&self, rating_key: &str, delay: Duration) {
        self.delays
            .write()
            .await
            .insert(rating_key.to_string(), delay);
    }

    /// Delay every resolution by a pseudo-random amount up to `max_ms`.
    pub async fn set_jitter(&self, seed: u64, max_ms: u64) {
        *self.jitter.write().await = Some((seed, max_ms));
    }

    /// Number of resolve calls made.
    pub fn resolve_count(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for MockMetadataSource {
    async fn resolve(
        &self,
        item: &ItemHandle,
        caches: Option<&LookupCaches>,
    ) -> Result<MetadataRecord, SourceError> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        let key = item.rating_key();

        let delay = match *self.jitter.read().await {
            Some((seed, max_ms)) => Some(jitter_delay(seed, key, max_ms)),
            None => self.delays.read().await.get(key).copied(),
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.failures.read().await.get(key) {
            return Err(err.clone());
        }

        if let Some(caches) = caches {
            if let Some(cached) = caches.movie(key).await {
                return Ok(cached);
            }
        }

        let record = self
            .records
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(key.to_string()))?;

        if let (Some(caches), MediaKind::Movie) = (caches, record.media_kind) {
            caches.insert_movie(record.clone()).await;
        }
        Ok(record)
    }
}
