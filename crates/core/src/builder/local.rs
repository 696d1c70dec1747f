//! Builder that reads assets from a local asset directory.
//!
//! Asset folders follow the usual media-manager layout:
//!
//! ```text
//! assets/
//!   Alien (1979)/
//!     poster.jpg
//!     background.jpg
//!   Severance (2022)/
//!     poster.png
//!     Season01.jpg
//! ```

use async_trait::async_trait;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::BuilderError;
use super::traits::{Builder, Builders};
use super::types::{AssetStat, BuildContext, ItemStats};
use crate::catalog::{MediaKind, MetadataRecord, SeasonRecord};
use crate::document::{entry_key, DocumentHandle};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

const MOVIE_FIELDS: &[&str] = &[
    "summary",
    "tagline",
    "genres",
    "studio",
    "content_rating",
    "originally_available",
    "rating",
    "directors",
    "writers",
    "cast",
    "collection",
];

const TV_FIELDS: &[&str] = &[
    "summary",
    "genres",
    "studio",
    "content_rating",
    "originally_available",
    "rating",
    "cast",
    "guest",
    "collection",
];

/// Movie or tv builder over a local asset directory.
#[derive(Debug, Clone)]
pub struct LocalAssetBuilder {
    kind: MediaKind,
    assets_dir: Option<PathBuf>,
    tracked_fields: &'static [&'static str],
}

impl LocalAssetBuilder {
    pub fn movie(assets_dir: Option<PathBuf>) -> Self {
        Self {
            kind: MediaKind::Movie,
            assets_dir,
            tracked_fields: MOVIE_FIELDS,
        }
    }

    pub fn tv(assets_dir: Option<PathBuf>) -> Self {
        Self {
            kind: MediaKind::Tv,
            assets_dir,
            tracked_fields: TV_FIELDS,
        }
    }

    /// Movie and tv builders sharing one asset directory.
    pub fn builders(assets_dir: Option<PathBuf>) -> Builders {
        Builders::new(
            Arc::new(Self::movie(assets_dir.clone())),
            Arc::new(Self::tv(assets_dir)),
        )
    }

    /// Percentage of tracked, non-ignored fields that are present and non-empty.
    fn completeness(&self, ctx: &BuildContext, meta: &MetadataRecord) -> f64 {
        let tracked: Vec<&str> = self
            .tracked_fields
            .iter()
            .copied()
            .filter(|f| !ctx.is_ignored(f))
            .collect();
        if tracked.is_empty() {
            return 100.0;
        }

        let present = tracked
            .iter()
            .filter(|f| meta.fields.get(**f).is_some_and(is_filled))
            .count();
        round2(present as f64 / tracked.len() as f64 * 100.0)
    }

    /// Assets the enabled flags ask for, found but not yet claimed.
    async fn locate_assets(
        &self,
        ctx: &BuildContext,
        dir: &Path,
        meta: &MetadataRecord,
    ) -> Result<FoundAssets, BuilderError> {
        let mut found = FoundAssets::default();
        if ctx.flags.poster {
            found.poster = find_asset(dir, "poster").await?;
        }
        if ctx.flags.background {
            found.background = find_asset(dir, "background").await?;
        }
        if ctx.flags.season && self.kind == MediaKind::Tv {
            for season in &meta.seasons {
                let stem = format!("Season{:02}", season.index);
                if let Some((path, size)) = find_asset(dir, &stem).await? {
                    found.seasons.push((season.index, path, size));
                }
            }
        }
        Ok(found)
    }

    fn entry_fields(
        &self,
        ctx: &BuildContext,
        meta: &MetadataRecord,
    ) -> Result<Mapping, BuilderError> {
        let mut fields = Mapping::new();
        fields.insert(Value::from("title"), Value::from(meta.title.as_str()));
        if let Some(year) = meta.year {
            fields.insert(Value::from("year"), Value::from(year));
        }

        if !ctx.flags.tracks_metadata() {
            return Ok(fields);
        }

        for (name, value) in &meta.fields {
            if ctx.is_ignored(name) || !is_filled(value) {
                continue;
            }
            let value = serde_yaml::to_value(value).map_err(|e| BuilderError::Field {
                field: name.clone(),
                reason: e.to_string(),
            })?;
            fields.insert(Value::from(name.as_str()), value);
        }

        if ctx.flags.metadata_enhanced && self.kind == MediaKind::Tv && !meta.seasons.is_empty() {
            fields.insert(Value::from("seasons"), seasons_block(&meta.seasons));
        }

        Ok(fields)
    }
}

#[async_trait]
impl Builder for LocalAssetBuilder {
    fn name(&self) -> &str {
        match self.kind {
            MediaKind::Movie => "local-movie",
            MediaKind::Tv => "local-tv",
            MediaKind::Unknown => "local",
        }
    }

    async fn build(
        &self,
        ctx: &BuildContext,
        doc: &DocumentHandle,
        meta: &MetadataRecord,
    ) -> Result<ItemStats, BuilderError> {
        if meta.title.trim().is_empty() {
            return Err(BuilderError::MalformedMetadata(format!(
                "item {} has no title",
                meta.rating_key
            )));
        }

        let full_title = meta.full_title();
        let mut stats = ItemStats {
            full_title: full_title.clone(),
            percent: self.completeness(ctx, meta),
            ..Default::default()
        };
        let mut fields = self.entry_fields(ctx, meta)?;

        // Locate every asset before claiming any, so a failed build leaves
        // the run-wide registry untouched.
        let found = match &self.assets_dir {
            Some(root) => {
                self.locate_assets(ctx, &root.join(asset_folder_name(&full_title)), meta)
                    .await?
            }
            None => FoundAssets::default(),
        };

        let counted = ctx.assets.claim_all(&found.paths()).await;
        let mut counted = counted.into_iter();

        if let Some((path, size)) = &found.poster {
            fields.insert(Value::from("file_poster"), path_value(path));
            if counted.next().unwrap_or(false) {
                stats.poster = Some(AssetStat { size: *size });
            }
        }

        if let Some((path, size)) = &found.background {
            fields.insert(Value::from("file_background"), path_value(path));
            if counted.next().unwrap_or(false) {
                stats.background = Some(AssetStat { size: *size });
            }
        }

        let mut posters = BTreeMap::new();
        for (index, _, size) in &found.seasons {
            if counted.next().unwrap_or(false) {
                posters.insert(*index, *size);
            }
        }
        if !posters.is_empty() {
            stats.season_posters = Some(posters);
        }

        doc.merge_entry(&entry_key(&meta.title, meta.year), fields)
            .await;

        Ok(stats)
    }
}

/// Assets located for one item, in claim order.
#[derive(Debug, Default)]
struct FoundAssets {
    poster: Option<(PathBuf, u64)>,
    background: Option<(PathBuf, u64)>,
    seasons: Vec<(u32, PathBuf, u64)>,
}

impl FoundAssets {
    fn paths(&self) -> Vec<&Path> {
        self.poster
            .iter()
            .chain(self.background.iter())
            .map(|(path, _)| path.as_path())
            .chain(self.seasons.iter().map(|(_, path, _)| path.as_path()))
            .collect()
    }
}

/// First image named `stem` in `dir`, with its size.
async fn find_asset(dir: &Path, stem: &str) -> Result<Option<(PathBuf, u64)>, BuilderError> {
    for ext in IMAGE_EXTENSIONS {
        let path = dir.join(format!("{}.{}", stem, ext));
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => return Ok(Some((path, meta.len()))),
            Ok(_) => continue,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(source) => return Err(BuilderError::Asset { path, source }),
        }
    }
    Ok(None)
}

/// Folder name for an item's assets. Path separators and characters most
/// filesystems reject are dropped.
fn asset_folder_name(full_title: &str) -> String {
    full_title
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect()
}

fn is_filled(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.trim().is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

fn seasons_block(seasons: &[SeasonRecord]) -> Value {
    let mut block = Mapping::new();
    for season in seasons {
        let mut season_fields = Mapping::new();
        if !season.title.is_empty() {
            season_fields.insert(Value::from("title"), Value::from(season.title.as_str()));
        }
        if !season.episodes.is_empty() {
            let mut episodes = Mapping::new();
            for episode in &season.episodes {
                let mut episode_fields = Mapping::new();
                episode_fields.insert(Value::from("title"), Value::from(episode.title.as_str()));
                episodes.insert(Value::from(episode.index), Value::Mapping(episode_fields));
            }
            season_fields.insert(Value::from("episodes"), Value::Mapping(episodes));
        }
        block.insert(Value::from(season.index), Value::Mapping(season_fields));
    }
    Value::Mapping(block)
}

fn path_value(path: &Path) -> Value {
    Value::from(path.to_string_lossy().into_owned())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
