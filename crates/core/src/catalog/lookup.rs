//! In-memory lookup caches for expensive catalog queries.

use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::{EpisodeRecord, MetadataRecord, SeasonRecord};
use crate::cache::CacheState;
use crate::metrics;

/// Three kind-specific caches consulted during metadata resolution.
///
/// Shared across libraries in a process; persisted through a
/// [`MetadataCache`](crate::cache::MetadataCache) after each successful run.
#[derive(Debug, Default)]
pub struct LookupCaches {
    movies: RwLock<HashMap<String, MetadataRecord>>,
    seasons: RwLock<HashMap<String, Vec<SeasonRecord>>>,
    episodes: RwLock<HashMap<String, Vec<EpisodeRecord>>>,
}

impl LookupCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: CacheState) -> Self {
        Self {
            movies: RwLock::new(state.movies),
            seasons: RwLock::new(state.seasons),
            episodes: RwLock::new(state.episodes),
        }
    }

    /// Snapshot of all three caches.
    pub async fn to_state(&self) -> CacheState {
        CacheState {
            movies: self.movies.read().await.clone(),
            seasons: self.seasons.read().await.clone(),
            episodes: self.episodes.read().await.clone(),
        }
    }

    pub async fn movie(&self, rating_key: &str) -> Option<MetadataRecord> {
        let hit = self.movies.read().await.get(rating_key).cloned();
        record_lookup("movie", hit.is_some());
        hit
    }

    pub async fn insert_movie(&self, record: MetadataRecord) {
        self.movies
            .write()
            .await
            .insert(record.rating_key.clone(), record);
    }

    /// Seasons of a show, without their episodes.
    pub async fn seasons(&self, show_key: &str) -> Option<Vec<SeasonRecord>> {
        let hit = self.seasons.read().await.get(show_key).cloned();
        record_lookup("season", hit.is_some());
        hit
    }

    pub async fn insert_seasons(&self, show_key: &str, seasons: Vec<SeasonRecord>) {
        self.seasons
            .write()
            .await
            .insert(show_key.to_string(), seasons);
    }

    pub async fn episodes(&self, show_key: &str, season: u32) -> Option<Vec<EpisodeRecord>> {
        let hit = self
            .episodes
            .read()
            .await
            .get(&episode_key(show_key, season))
            .cloned();
        record_lookup("episode", hit.is_some());
        hit
    }

    pub async fn insert_episodes(&self, show_key: &str, season: u32, episodes: Vec<EpisodeRecord>) {
        self.episodes
            .write()
            .await
            .insert(episode_key(show_key, season), episodes);
    }

    /// Total number of cached entries across all three caches.
    pub async fn len(&self) -> usize {
        self.movies.read().await.len()
            + self.seasons.read().await.len()
            + self.episodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn episode_key(show_key: &str, season: u32) -> String {
    format!("{}/{}", show_key, season)
}

fn record_lookup(kind: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::CACHE_LOOKUPS
        .with_label_values(&[kind, result])
        .inc();
}
