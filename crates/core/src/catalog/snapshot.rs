//! Catalog backed by a JSON export of its libraries.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{
    CatalogError, ItemHandle, Library, LookupCaches, MediaKind, MetadataRecord, MetadataSource,
    SeasonRecord, SourceError,
};

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    libraries: Vec<SnapshotLibraryEntry>,
}

#[derive(Debug, Deserialize)]
struct SnapshotLibraryEntry {
    title: String,
    #[serde(default)]
    items: Vec<SnapshotItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct SnapshotItem {
    rating_key: String,
    #[serde(rename = "type", default)]
    kind: MediaKind,
    #[serde(default)]
    title: String,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    seasons: Vec<SeasonRecord>,
}

#[derive(Debug)]
struct IndexedItem {
    library_name: String,
    item: SnapshotItem,
}

impl IndexedItem {
    fn base_record(&self) -> MetadataRecord {
        MetadataRecord {
            rating_key: self.item.rating_key.clone(),
            title: self.item.title.clone(),
            year: self.item.year,
            library_name: self.library_name.clone(),
            media_kind: self.item.kind,
            fields: self.item.fields.clone(),
            seasons: Vec::new(),
        }
    }
}

/// One library of a snapshot. Enumeration returns handles in export order.
#[derive(Debug)]
pub struct SnapshotLibrary {
    name: String,
    keys: Vec<String>,
}

impl Library for SnapshotLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn all_items(&self) -> Result<Vec<ItemHandle>, CatalogError> {
        Ok(self.keys.iter().map(ItemHandle::new).collect())
    }
}

/// Catalog snapshot acting as both library enumerator and metadata source.
#[derive(Debug)]
pub struct SnapshotCatalog {
    libraries: Vec<Arc<SnapshotLibrary>>,
    items: HashMap<String, IndexedItem>,
}

impl SnapshotCatalog {
    /// Read and index a snapshot file.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CatalogError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// Index a snapshot from its JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: SnapshotFile =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut libraries = Vec::with_capacity(file.libraries.len());
        let mut items = HashMap::new();

        for entry in file.libraries {
            let keys = entry
                .items
                .iter()
                .map(|item| item.rating_key.clone())
                .collect();
            for item in entry.items {
                items.insert(
                    item.rating_key.clone(),
                    IndexedItem {
                        library_name: entry.title.clone(),
                        item,
                    },
                );
            }
            libraries.push(Arc::new(SnapshotLibrary {
                name: entry.title,
                keys,
            }));
        }

        Ok(Self { libraries, items })
    }

    pub fn library_names(&self) -> Vec<&str> {
        self.libraries.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn libraries(&self) -> Vec<Arc<dyn Library>> {
        self.libraries
            .iter()
            .map(|l| Arc::clone(l) as Arc<dyn Library>)
            .collect()
    }

    pub fn library(&self, name: &str) -> Result<Arc<dyn Library>, CatalogError> {
        self.libraries
            .iter()
            .find(|l| l.name == name)
            .map(|l| Arc::clone(l) as Arc<dyn Library>)
            .ok_or_else(|| CatalogError::LibraryNotFound(name.to_string()))
    }

    async fn resolve_seasons(
        &self,
        indexed: &IndexedItem,
        caches: Option<&LookupCaches>,
    ) -> Vec<SeasonRecord> {
        let show_key = indexed.item.rating_key.as_str();

        let cached = match caches {
            Some(c) => c.seasons(show_key).await,
            None => None,
        };
        let mut seasons = match cached {
            Some(seasons) => seasons,
            None => {
                let stripped: Vec<SeasonRecord> = indexed
                    .item
                    .seasons
                    .iter()
                    .map(|s| SeasonRecord {
                        index: s.index,
                        title: s.title.clone(),
                        episodes: Vec::new(),
                    })
                    .collect();
                if let Some(c) = caches {
                    c.insert_seasons(show_key, stripped.clone()).await;
                }
                stripped
            }
        };

        for season in &mut seasons {
            let cached = match caches {
                Some(c) => c.episodes(show_key, season.index).await,
                None => None,
            };
            season.episodes = match cached {
                Some(episodes) => episodes,
                None => {
                    let episodes = indexed
                        .item
                        .seasons
                        .iter()
                        .find(|s| s.index == season.index)
                        .map(|s| s.episodes.clone())
                        .unwrap_or_default();
                    if let Some(c) = caches {
                        c.insert_episodes(show_key, season.index, episodes.clone())
                            .await;
                    }
                    episodes
                }
            };
        }

        seasons
    }
}

#[async_trait]
impl MetadataSource for SnapshotCatalog {
    async fn resolve(
        &self,
        item: &ItemHandle,
        caches: Option<&LookupCaches>,
    ) -> Result<MetadataRecord, SourceError> {
        let key = item.rating_key();
        let indexed = self
            .items
            .get(key)
            .ok_or_else(|| SourceError::NotFound(key.to_string()))?;

        match indexed.item.kind {
            MediaKind::Movie => {
                if let Some(c) = caches {
                    if let Some(record) = c.movie(key).await {
                        debug!("Movie cache hit for {}", key);
                        return Ok(record);
                    }
                }
                let record = indexed.base_record();
                if let Some(c) = caches {
                    c.insert_movie(record.clone()).await;
                }
                Ok(record)
            }
            MediaKind::Tv => {
                let mut record = indexed.base_record();
                record.seasons = self.resolve_seasons(indexed, caches).await;
                Ok(record)
            }
            MediaKind::Unknown => Ok(indexed.base_record()),
        }
    }
}
