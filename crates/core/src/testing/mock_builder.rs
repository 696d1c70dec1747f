//! Mock builder for testing.

use async_trait::async_trait;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::fixtures::jitter_delay;
use crate::builder::{BuildContext, Builder, BuilderError, ItemStats};
use crate::catalog::MetadataRecord;
use crate::document::{entry_key, DocumentHandle};

/// Mock implementation of the Builder trait.
///
/// Provides controllable behavior for testing:
/// - Per-key stats (everything else builds at 100%)
/// - Per-key errors and panics
/// - Jittered build delays
/// - Records every call for assertions
///
/// A successful build merges `title`, `year` and `percent` into the document.
#[derive(Debug)]
pub struct MockBuilder {
    name: String,
    stats: Arc<RwLock<HashMap<String, ItemStats>>>,
    fail_keys: Arc<RwLock<HashSet<String>>>,
    panic_keys: Arc<RwLock<HashSet<String>>>,
    /// `(seed, max_ms)` for jittered delays.
    jitter: Arc<RwLock<Option<(u64, u64)>>>,
    delay: Arc<RwLock<Duration>>,
    builds: Arc<RwLock<Vec<String>>>,
    libraries: Arc<RwLock<Vec<String>>>,
}

impl MockBuilder {
    /// Create a new mock builder.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stats: Arc::new(RwLock::new(HashMap::new())),
            fail_keys: Arc::new(RwLock::new(HashSet::new())),
            panic_keys: Arc::new(RwLock::new(HashSet::new())),
            jitter: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            builds: Arc::new(RwLock::new(Vec::new())),
            libraries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Stats returned for `rating_key`. `full_title` is filled in on build.
    pub async fn set_stats(&self, rating_key: &str, stats: ItemStats) {
        self.stats
            .write()
            .await
            .insert(rating_key.to_string(), stats);
    }

    /// Make building `rating_key` return an error.
    pub async fn fail_key(&self, rating_key: &str) {
        self.fail_keys.write().await.insert(rating_key.to_string());
    }

    /// Make building `rating_key` panic.
    pub async fn panic_key(&self, rating_key: &str) {
        self.panic_keys.write().await.insert(rating_key.to_string());
    }

    /// Delay every build by a pseudo-random amount up to `max_ms`.
    pub async fn set_jitter(&self, seed: u64, max_ms: u64) {
        *self.jitter.write().await = Some((seed, max_ms));
    }

    /// Delay every build by a fixed amount.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Number of build calls, failed ones included.
    pub async fn build_count(&self) -> usize {
        self.builds.read().await.len()
    }

    /// Rating keys passed to build, in call order.
    pub async fn built_keys(&self) -> Vec<String> {
        self.builds.read().await.clone()
    }

    /// Library names seen in the build context, in call order.
    pub async fn seen_libraries(&self) -> Vec<String> {
        self.libraries.read().await.clone()
    }
}

#[async_trait]
impl Builder for MockBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn build(
        &self,
        ctx: &BuildContext,
        doc: &DocumentHandle,
        meta: &MetadataRecord,
    ) -> Result<ItemStats, BuilderError> {
        let key = meta.rating_key.as_str();
        self.builds.write().await.push(key.to_string());
        self.libraries.write().await.push(ctx.library_name.clone());

        let delay = match *self.jitter.read().await {
            Some((seed, max_ms)) => jitter_delay(seed, key, max_ms),
            None => *self.delay.read().await,
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.panic_keys.read().await.contains(key) {
            panic!("mock builder panicked on {}", meta.full_title());
        }
        if self.fail_keys.read().await.contains(key) {
            return Err(BuilderError::Other(format!(
                "mock build failure for {}",
                meta.full_title()
            )));
        }

        let mut stats = self
            .stats
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or(ItemStats {
                percent: 100.0,
                ..Default::default()
            });
        stats.full_title = meta.full_title();

        let mut fields = Mapping::new();
        fields.insert(Value::from("title"), Value::from(meta.title.clone()));
        if let Some(year) = meta.year {
            fields.insert(Value::from("year"), Value::from(year));
        }
        fields.insert(Value::from("percent"), Value::from(stats.percent));
        doc.merge_entry(&entry_key(&meta.title, meta.year), fields)
            .await;

        Ok(stats)
    }
}
