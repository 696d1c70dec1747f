//! Types for the builder module.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{Config, FeatureFlags};

/// Size of one asset file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStat {
    /// Size in bytes.
    pub size: u64,
}

/// Per-item result of a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    /// `"{title} ({year})"` of the item.
    pub full_title: String,
    /// Poster asset, when poster stats were requested and one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<AssetStat>,
    /// Background asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<AssetStat>,
    /// Season number -> poster size (tv).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_posters: Option<BTreeMap<u32, u64>>,
    /// Single season poster, for builders that only report one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_poster: Option<AssetStat>,
    /// Completeness of the item's metadata, 0-100.
    #[serde(default)]
    pub percent: f64,
}

impl ItemStats {
    pub fn poster_size(&self) -> u64 {
        self.poster.map_or(0, |p| p.size)
    }

    pub fn background_size(&self) -> u64 {
        self.background.map_or(0, |b| b.size)
    }

    /// Sum of the season poster map, or the single season poster if no map.
    pub fn season_asset_size(&self) -> u64 {
        match &self.season_posters {
            Some(posters) => posters.values().sum(),
            None => self.season_poster.map_or(0, |s| s.size),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }
}

/// Assets already counted during a run.
///
/// Shared by every builder call in a run so an asset referenced by two items
/// contributes its size once.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    seen: Arc<Mutex<HashSet<PathBuf>>>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every path under one lock; each flag is `false` for a path
    /// that was already recorded.
    pub async fn claim_all(&self, paths: &[&Path]) -> Vec<bool> {
        let mut seen = self.seen.lock().await;
        paths
            .iter()
            .map(|path| {
                let fresh = seen.insert(path.to_path_buf());
                if !fresh {
                    debug!("Asset {} already counted", path.display());
                }
                fresh
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Everything a builder needs besides the item itself.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub config: Arc<Config>,
    pub flags: FeatureFlags,
    pub ignored_fields: Arc<BTreeSet<String>>,
    pub library_name: String,
    pub assets: AssetRegistry,
}

impl BuildContext {
    /// Same context, attributed to another library.
    pub fn for_library(&self, library_name: &str) -> Self {
        Self {
            library_name: library_name.to_string(),
            ..self.clone()
        }
    }

    pub fn is_ignored(&self, field: &str) -> bool {
        self.ignored_fields.contains(field)
    }
}
