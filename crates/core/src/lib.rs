pub mod aggregator;
pub mod builder;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod document;
pub mod metrics;
pub mod processor;
pub mod report;
pub mod testing;

pub use aggregator::{
    LibraryAggregator, LibraryError, LibraryOutcome, LibraryRun, LibrarySummary, MetadataSummary,
    RunOptions, SummaryCollector,
};
pub use builder::{Builder, BuilderError, Builders, ItemStats, LocalAssetBuilder};
pub use cache::{CacheError, MetadataCache, SqliteMetadataCache};
pub use catalog::{
    CatalogError, ItemHandle, Library, LookupCaches, MediaKind, MetadataRecord, MetadataSource,
    SnapshotCatalog, SourceError,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, FeatureFlags,
};
pub use document::{ConsolidatedDocument, DocumentError, DocumentHandle};
pub use processor::{ItemError, ItemOutcome, ItemProcessor, SkipReason};
pub use report::{create_report_system, LogSink, ProcessingEvent, ReportHandle, ReportSink};
