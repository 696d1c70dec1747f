//! Testing utilities and mock implementations for pipeline tests.
//!
//! This module provides mock implementations of the catalog and builder
//! traits, allowing full library runs without a real catalog or asset tree.
//!
//! # Example
//!
//! ```rust,ignore
//! use plexmeta_core::testing::{MockBuilder, MockLibrary, MockMetadataSource};
//! use plexmeta_core::testing::fixtures::movie_record;
//!
//! let library = MockLibrary::new("Movies", ["1", "2"]);
//! let source = MockMetadataSource::new();
//! source.add_record(movie_record("1", "Alien", 1979)).await;
//!
//! let builder = MockBuilder::new("mock-movie");
//! builder.fail_key("2").await;
//! ```

mod mock_builder;
mod mock_library;
mod mock_source;

pub use mock_builder::MockBuilder;
pub use mock_library::MockLibrary;
pub use mock_source::MockMetadataSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{Map, Value};
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    use crate::builder::{AssetRegistry, BuildContext};
    use crate::catalog::{EpisodeRecord, MediaKind, MetadataRecord, SeasonRecord};
    use crate::config::{
        AssetsConfig, CacheConfig, CatalogConfig, Config, FeatureFlags, MetadataConfig,
        MetricsConfig, ProcessingConfig,
    };
    use crate::report::{ProcessingEvent, ReportEnvelope, ReportHandle};

    /// Library name used by fixtures that don't care.
    pub const TEST_LIBRARY: &str = "Test Library";

    /// Create a metadata record with no fields.
    pub fn record(
        rating_key: &str,
        title: &str,
        year: Option<i32>,
        media_kind: MediaKind,
    ) -> MetadataRecord {
        MetadataRecord {
            rating_key: rating_key.to_string(),
            title: title.to_string(),
            year,
            library_name: TEST_LIBRARY.to_string(),
            media_kind,
            fields: Map::new(),
            seasons: Vec::new(),
        }
    }

    /// Create a movie record with a summary and genres.
    pub fn movie_record(rating_key: &str, title: &str, year: i32) -> MetadataRecord {
        let mut meta = record(rating_key, title, Some(year), MediaKind::Movie);
        meta.fields.insert(
            "summary".to_string(),
            Value::from(format!("{} is a test movie.", title)),
        );
        meta.fields.insert(
            "genres".to_string(),
            Value::from(vec!["Drama".to_string()]),
        );
        meta
    }

    /// Create a show record with one season of two episodes.
    pub fn show_record(rating_key: &str, title: &str, year: i32) -> MetadataRecord {
        let mut meta = record(rating_key, title, Some(year), MediaKind::Tv);
        meta.fields.insert(
            "summary".to_string(),
            Value::from(format!("{} is a test show.", title)),
        );
        meta.seasons = vec![SeasonRecord {
            index: 1,
            title: "Season 1".to_string(),
            episodes: (1..=2)
                .map(|index| EpisodeRecord {
                    index,
                    title: format!("Episode {}", index),
                    fields: Map::new(),
                })
                .collect(),
        }];
        meta
    }

    /// Config with every feature on, the cache off, and documents under
    /// `metadata_dir`.
    pub fn test_config(metadata_dir: impl Into<PathBuf>) -> Config {
        Config {
            catalog: CatalogConfig {
                snapshot_path: PathBuf::from("catalog.json"),
                libraries: Vec::new(),
            },
            metadata: MetadataConfig {
                directory: metadata_dir.into(),
            },
            features: FeatureFlags::all(),
            processing: ProcessingConfig::default(),
            assets: AssetsConfig::default(),
            cache: CacheConfig {
                enabled: false,
                ..Default::default()
            },
            metrics: MetricsConfig::default(),
        }
    }

    /// Build context for a single item call.
    pub fn build_context(config: Config) -> BuildContext {
        BuildContext {
            flags: config.features,
            ignored_fields: Arc::new(config.processing.ignored_fields.clone()),
            config: Arc::new(config),
            library_name: TEST_LIBRARY.to_string(),
            assets: AssetRegistry::new(),
        }
    }

    /// Report handle backed by a channel large enough for a test run.
    pub fn test_report_channel() -> (ReportHandle, mpsc::Receiver<ReportEnvelope>) {
        report_channel(4096)
    }

    /// Report handle whose channel holds at most `buffer` unread events.
    pub fn report_channel(buffer: usize) -> (ReportHandle, mpsc::Receiver<ReportEnvelope>) {
        let (tx, rx) = mpsc::channel(buffer);
        (ReportHandle::new(tx), rx)
    }

    /// Every event emitted so far.
    pub fn drain_events(rx: &mut mpsc::Receiver<ReportEnvelope>) -> Vec<ProcessingEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    /// Deterministic pseudo-random delay in `0..=max_ms` for `key`.
    ///
    /// Different seeds give different schedules for the same keys.
    pub fn jitter_delay(seed: u64, key: &str, max_ms: u64) -> Duration {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        key.hash(&mut hasher);
        Duration::from_millis(hasher.finish() % (max_ms + 1))
    }
}
