//! Durable lookup cache for expensive catalog queries.
//!
//! The cache is loaded once at startup into [`LookupCaches`](crate::catalog::LookupCaches)
//! and saved after every successful, non-dry-run library persist.

mod sqlite;

pub use sqlite::SqliteMetadataCache;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::catalog::{EpisodeRecord, MetadataRecord, SeasonRecord};

/// Everything the lookup caches hold, in a persistable form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheState {
    /// Movie rating key -> resolved record.
    #[serde(default)]
    pub movies: HashMap<String, MetadataRecord>,
    /// Show rating key -> seasons (without episodes).
    #[serde(default)]
    pub seasons: HashMap<String, Vec<SeasonRecord>>,
    /// `"{show}/{season}"` -> episodes.
    #[serde(default)]
    pub episodes: HashMap<String, Vec<EpisodeRecord>>,
}

impl CacheState {
    pub fn len(&self) -> usize {
        self.movies.len() + self.seasons.len() + self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Database(String),

    #[error("cache entry could not be decoded: {0}")]
    Decode(String),
}

/// Storage for the lookup cache.
pub trait MetadataCache: Send + Sync {
    /// Load the whole cache.
    fn load(&self) -> Result<CacheState, CacheError>;

    /// Replace the stored cache with `state`.
    fn save(&self, state: &CacheState) -> Result<(), CacheError>;
}
