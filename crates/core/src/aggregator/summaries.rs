//! Per-library results collected across a multi-library run.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::{LibrarySummary, MetadataSummary};
use crate::catalog::is_unknown_library;

/// Shared collector for library summaries and their side tables.
///
/// Cheaply cloneable; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct SummaryCollector {
    summaries: Arc<RwLock<BTreeMap<String, MetadataSummary>>>,
    item_counts: Arc<RwLock<BTreeMap<String, usize>>>,
    asset_sizes: Arc<RwLock<BTreeMap<String, u64>>>,
}

impl SummaryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished run.
    ///
    /// `processed_items` is the number of item tasks that finished, whatever
    /// their outcome. Libraries the catalog could not name get no item count.
    pub async fn record(&self, summary: &LibrarySummary, processed_items: usize) {
        let name = summary.library_name.clone();

        self.summaries
            .write()
            .await
            .insert(name.clone(), MetadataSummary::from(summary));
        if !is_unknown_library(&name) {
            self.item_counts
                .write()
                .await
                .insert(name.clone(), processed_items);
        }
        self.asset_sizes
            .write()
            .await
            .insert(name, summary.total_asset_size);
    }

    pub async fn summary(&self, library_name: &str) -> Option<MetadataSummary> {
        self.summaries.read().await.get(library_name).cloned()
    }

    pub async fn summaries(&self) -> BTreeMap<String, MetadataSummary> {
        self.summaries.read().await.clone()
    }

    /// Processed item count per library.
    pub async fn item_counts(&self) -> BTreeMap<String, usize> {
        self.item_counts.read().await.clone()
    }

    /// Total asset bytes per library.
    pub async fn asset_sizes(&self) -> BTreeMap<String, u64> {
        self.asset_sizes.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.summaries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
