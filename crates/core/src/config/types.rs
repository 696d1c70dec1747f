use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Where consolidated documents are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    #[serde(default = "default_metadata_dir")]
    pub directory: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            directory: default_metadata_dir(),
        }
    }
}

fn default_metadata_dir() -> PathBuf {
    PathBuf::from("metadata")
}

/// Optional work selected for a run.
///
/// Immutable for the duration of a library run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeatureFlags {
    /// Emit poster asset stats.
    #[serde(default)]
    pub poster: bool,
    /// Emit background asset stats.
    #[serde(default)]
    pub background: bool,
    /// Emit season poster asset stats.
    #[serde(default)]
    pub season: bool,
    /// Completeness tracking with the basic field set.
    #[serde(default)]
    pub metadata_basic: bool,
    /// Completeness tracking plus per-season blocks.
    #[serde(default)]
    pub metadata_enhanced: bool,
    /// Compute everything, persist nothing.
    #[serde(default)]
    pub dry_run: bool,
}

impl FeatureFlags {
    /// Whether completeness counters are tracked for this run.
    pub fn tracks_metadata(&self) -> bool {
        self.metadata_basic || self.metadata_enhanced
    }

    /// Every asset and metadata option on, persistence enabled.
    pub fn all() -> Self {
        Self {
            poster: true,
            background: true,
            season: true,
            metadata_basic: true,
            metadata_enhanced: true,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Fan-out configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    /// Maximum items processed at once (0 = one task per item, unbounded).
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,
    /// Field names builders skip.
    #[serde(default = "default_ignored_fields")]
    pub ignored_fields: BTreeSet<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_items: default_max_concurrent_items(),
            ignored_fields: default_ignored_fields(),
        }
    }
}

fn default_max_concurrent_items() -> usize {
    16
}

/// The fields skipped when nothing else is configured.
pub fn default_ignored_fields() -> BTreeSet<String> {
    ["collection", "guest"].into_iter().map(String::from).collect()
}

/// Catalog snapshot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// JSON export of the catalog's libraries.
    pub snapshot_path: PathBuf,
    /// Libraries to process (empty = all).
    #[serde(default)]
    pub libraries: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AssetsConfig {
    /// Root of the per-item asset folders. No asset stats without it.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Lookup cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            path: default_cache_path(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("plexmeta-cache.db")
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Write the Prometheus text exposition here at the end of a run.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}
