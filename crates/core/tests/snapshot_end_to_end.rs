//! End-to-end runs over a catalog snapshot with the local asset builder.
//!
//! These tests use the shipped implementations only:
//! - `SnapshotCatalog` as library enumerator and metadata source
//! - `LocalAssetBuilder` sizing assets from a temp asset directory
//! - `SqliteMetadataCache` persisted to disk between runs

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;

use plexmeta_core::{
    aggregator::{LibraryAggregator, RunOptions, SummaryCollector},
    builder::LocalAssetBuilder,
    cache::{MetadataCache, SqliteMetadataCache},
    catalog::{LookupCaches, MediaKind, SnapshotCatalog},
    config::Config,
    document::ConsolidatedDocument,
    report::ReportEnvelope,
    testing::fixtures::{drain_events, test_config, test_report_channel},
};

const SNAPSHOT: &str = r#"
{
  "libraries": [
    {
      "title": "Movies",
      "items": [
        {"rating_key": "1", "type": "movie", "title": "Alien", "year": 1979,
         "fields": {"summary": "In space no one can hear you scream.", "studio": "20th Century Fox"}},
        {"rating_key": "2", "type": "movie", "title": "Heat", "year": 1995}
      ]
    },
    {
      "title": "TV Shows",
      "items": [
        {"rating_key": "10", "type": "show", "title": "Severance", "year": 2022,
         "fields": {"summary": "Work-life balance, surgically enforced."},
         "seasons": [
           {"index": 1, "title": "Season 1", "episodes": [
             {"index": 1, "title": "Good News About Hell"},
             {"index": 2, "title": "Half Loop"}
           ]},
           {"index": 2, "title": "Season 2"}
         ]},
        {"rating_key": "11", "type": "artist", "title": "Boards of Canada"}
      ]
    }
  ]
}
"#;

fn write_asset(root: &Path, folder: &str, name: &str, bytes: usize) {
    let dir = root.join(folder);
    std::fs::create_dir_all(&dir).expect("Failed to create asset folder");
    std::fs::write(dir.join(name), vec![0u8; bytes]).expect("Failed to write asset");
}

struct Fixture {
    temp_dir: TempDir,
    catalog: Arc<SnapshotCatalog>,
    config: Config,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let assets = temp_dir.path().join("assets");
        write_asset(&assets, "Alien (1979)", "poster.jpg", 1000);
        write_asset(&assets, "Alien (1979)", "background.png", 500);
        write_asset(&assets, "Severance (2022)", "poster.jpg", 300);
        write_asset(&assets, "Severance (2022)", "Season01.jpg", 40);
        write_asset(&assets, "Severance (2022)", "Season02.webp", 60);

        let mut config = test_config(temp_dir.path().join("metadata"));
        config.assets.directory = Some(assets);
        config.cache.enabled = true;
        config.cache.path = temp_dir.path().join("cache.db");

        Self {
            catalog: Arc::new(SnapshotCatalog::from_json_str(SNAPSHOT).expect("Invalid snapshot")),
            config,
            temp_dir,
        }
    }

    fn open_cache(&self) -> Arc<SqliteMetadataCache> {
        Arc::new(SqliteMetadataCache::new(&self.config.cache.path).expect("Failed to open cache"))
    }

    fn aggregator(
        &self,
        cache: Arc<SqliteMetadataCache>,
        summaries: SummaryCollector,
    ) -> (LibraryAggregator, mpsc::Receiver<ReportEnvelope>) {
        let state = cache.load().expect("Failed to load cache");
        let (report, events) = test_report_channel();
        let aggregator = LibraryAggregator::new(
            Arc::new(self.config.clone()),
            self.catalog.clone(),
            LocalAssetBuilder::builders(self.config.assets.directory.clone()),
            report,
        )
        .with_cache(cache)
        .with_lookup_caches(Arc::new(LookupCaches::from_state(state)))
        .with_summaries(summaries);
        (aggregator, events)
    }
}

#[tokio::test]
async fn test_movie_library_end_to_end() {
    let fixture = Fixture::new();
    let (aggregator, _events) = fixture.aggregator(fixture.open_cache(), SummaryCollector::new());
    let movies = fixture.catalog.library("Movies").unwrap();

    let run = aggregator
        .run(movies, &RunOptions::from_config(&fixture.config))
        .await
        .expect("Run should succeed");

    assert!(run.persisted);
    assert_eq!(run.summary.media_kind, MediaKind::Movie);
    assert_eq!(run.summary.total_items, 2);
    assert_eq!(run.summary.poster_size, 1000);
    assert_eq!(run.summary.background_size, 500);
    assert_eq!(run.summary.total_asset_size, 1500);
    // Neither movie has all of its tracked fields.
    assert_eq!(run.summary.completed, 0);
    assert_eq!(run.summary.incomplete, 2);
    assert_eq!(run.summary.percent_complete, 0.0);

    let doc = ConsolidatedDocument::load(&run.output_path)
        .await
        .unwrap()
        .unwrap();
    let alien = doc.entry("Alien (1979)").unwrap();
    assert_eq!(alien.get("studio").unwrap().as_str(), Some("20th Century Fox"));
    assert!(alien.get("file_poster").is_some());
    assert!(doc.contains("Heat (1995)"));
}

#[tokio::test]
async fn test_show_library_end_to_end() {
    let fixture = Fixture::new();
    let (aggregator, _events) = fixture.aggregator(fixture.open_cache(), SummaryCollector::new());
    let shows = fixture.catalog.library("TV Shows").unwrap();

    let run = aggregator
        .run(shows, &RunOptions::from_config(&fixture.config))
        .await
        .unwrap();

    // The artist is skipped; the show is built.
    assert_eq!(run.stats.len(), 1);
    assert_eq!(run.summary.total_items, 2);
    assert_eq!(run.summary.media_kind, MediaKind::Tv);
    assert_eq!(run.summary.poster_size, 300);
    assert_eq!(run.summary.season_poster_size, 100);
    assert!(run.output_path.ends_with("tv_metadata.yml"));

    let doc = ConsolidatedDocument::load(&run.output_path)
        .await
        .unwrap()
        .unwrap();
    let severance = doc.entry("Severance (2022)").unwrap();
    assert!(severance.get("seasons").is_some());
    assert!(!doc.contains("Boards of Canada (Unknown)"));
}

#[tokio::test]
async fn test_second_run_reuses_saved_cache_and_document() {
    let fixture = Fixture::new();
    let options = RunOptions::from_config(&fixture.config);

    let (first, _first_events) = fixture.aggregator(fixture.open_cache(), SummaryCollector::new());
    first
        .run(fixture.catalog.library("Movies").unwrap(), &options)
        .await
        .unwrap();
    first
        .run(fixture.catalog.library("TV Shows").unwrap(), &options)
        .await
        .unwrap();
    drop(first);

    let saved = fixture.open_cache().load().unwrap();
    assert!(saved.movies.contains_key("1"));
    assert!(saved.seasons.contains_key("10"));
    assert!(saved.episodes.contains_key("10/1"));

    // A fresh aggregator starts from the saved cache and the written document.
    let summaries = SummaryCollector::new();
    let (second, _second_events) = fixture.aggregator(fixture.open_cache(), summaries.clone());
    let run = second
        .run(fixture.catalog.library("Movies").unwrap(), &options)
        .await
        .unwrap();

    assert_eq!(run.stats.len(), 2);
    let doc = ConsolidatedDocument::load(&run.output_path)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.len(), 2);
    assert_eq!(summaries.summary("Movies").await.unwrap().total_items, 2);
    assert!(fixture.temp_dir.path().join("metadata").join("tv_metadata.yml").exists());
}

#[tokio::test]
async fn test_run_all_over_every_library() {
    let fixture = Fixture::new();
    let summaries = SummaryCollector::new();
    let (report, mut events) = test_report_channel();
    let aggregator = LibraryAggregator::new(
        Arc::new(fixture.config.clone()),
        fixture.catalog.clone(),
        LocalAssetBuilder::builders(fixture.config.assets.directory.clone()),
        report,
    )
    .with_summaries(summaries.clone());

    let outcomes = aggregator
        .run_all(
            fixture.catalog.libraries(),
            &RunOptions::from_config(&fixture.config),
        )
        .await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.is_ok()));
    assert_eq!(summaries.len().await, 2);
    assert_eq!(summaries.asset_sizes().await.get("Movies"), Some(&1500));
    assert_eq!(summaries.asset_sizes().await.get("TV Shows"), Some(&400));

    let summaries_emitted = drain_events(&mut events)
        .iter()
        .filter(|e| e.event_type() == "library_summary")
        .count();
    assert_eq!(summaries_emitted, 2);
}
