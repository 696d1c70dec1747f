//! Types for the library aggregator.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::builder::ItemStats;
use crate::catalog::{CatalogError, ClassificationKey, MediaKind, MetadataRecord, SourceError};
use crate::config::{Config, FeatureFlags};

/// Errors that end a library run.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The item list could not be loaded.
    #[error("enumeration failed: {0}")]
    Enumeration(#[from] CatalogError),

    /// An item could not be resolved while classifying the library.
    #[error("classification failed: {0}")]
    Classification(#[from] SourceError),

    /// A task of the run failed outside any item's isolation boundary.
    #[error("task failed: {0}")]
    Task(String),

    /// The run was cancelled before it could persist.
    #[error("run cancelled")]
    Cancelled,
}

impl LibraryError {
    /// Metrics label for this failure.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            _ => "failed",
        }
    }
}

/// Options fixed for the duration of one library run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub flags: FeatureFlags,
    pub ignored_fields: Arc<BTreeSet<String>>,
}

impl RunOptions {
    pub fn new(flags: FeatureFlags, ignored_fields: BTreeSet<String>) -> Self {
        Self {
            flags,
            ignored_fields: Arc::new(ignored_fields),
        }
    }

    /// The flags and ignored fields configured in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.features, config.processing.ignored_fields.clone())
    }

    pub fn with_flags(mut self, flags: FeatureFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Resolved items of one run keyed by `(title, year, kind)`.
///
/// Created fresh by every run and dropped with it.
#[derive(Debug, Default)]
pub struct ClassificationMap {
    entries: HashMap<ClassificationKey, MetadataRecord>,
    first_kind: Option<MediaKind>,
}

impl ClassificationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: MetadataRecord) {
        self.first_kind.get_or_insert(record.media_kind);
        self.entries.insert(record.classification_key(), record);
    }

    /// Kind of the first item classified, `Unknown` if there was none.
    pub fn dominant_kind(&self) -> MediaKind {
        self.first_kind.unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Running totals for one library run.
///
/// Owned by a single fold task; item tasks never touch it directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunAccumulator {
    pub poster_size: u64,
    pub background_size: u64,
    pub season_poster_size: u64,
    pub total_asset_size: u64,
    pub completed: usize,
    pub incomplete: usize,
}

impl RunAccumulator {
    /// Fold one item's stats into the totals.
    pub fn fold(&mut self, stats: &ItemStats, flags: FeatureFlags) {
        if flags.poster {
            self.poster_size += stats.poster_size();
        }
        if flags.background {
            self.background_size += stats.background_size();
        }
        if flags.season {
            self.season_poster_size += stats.season_asset_size();
        }
        self.total_asset_size = self.poster_size + self.background_size + self.season_poster_size;

        if flags.tracks_metadata() {
            if stats.is_complete() {
                self.completed += 1;
            } else {
                self.incomplete += 1;
            }
        }
    }

    /// Whether the total equals the sum of its parts.
    pub fn is_consistent(&self) -> bool {
        self.total_asset_size == self.poster_size + self.background_size + self.season_poster_size
    }
}

/// `round(completed / total * 100, 2)`, or `0.0` for an empty library.
pub fn percent_complete(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percent = completed as f64 / total as f64 * 100.0;
    (percent * 100.0).round() / 100.0
}

/// Everything reported about a finished library run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySummary {
    pub library_name: String,
    pub media_kind: MediaKind,
    pub total_items: usize,
    pub completed: usize,
    pub incomplete: usize,
    pub percent_complete: f64,
    pub poster_size: u64,
    pub background_size: u64,
    pub season_poster_size: u64,
    pub total_asset_size: u64,
    /// Whether completeness was tracked for this run.
    pub run_metadata: bool,
}

impl LibrarySummary {
    pub fn new(
        library_name: &str,
        media_kind: MediaKind,
        total_items: usize,
        totals: &RunAccumulator,
        flags: FeatureFlags,
    ) -> Self {
        Self {
            library_name: library_name.to_string(),
            media_kind,
            total_items,
            completed: totals.completed,
            incomplete: totals.incomplete,
            percent_complete: percent_complete(totals.completed, total_items),
            poster_size: totals.poster_size,
            background_size: totals.background_size,
            season_poster_size: totals.season_poster_size,
            total_asset_size: totals.total_asset_size,
            run_metadata: flags.tracks_metadata(),
        }
    }
}

/// Completeness figures recorded per library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSummary {
    pub complete: usize,
    pub incomplete: usize,
    pub total_items: usize,
    /// `None` when completeness was not tracked.
    pub percent_complete: Option<f64>,
}

impl From<&LibrarySummary> for MetadataSummary {
    fn from(summary: &LibrarySummary) -> Self {
        Self {
            complete: summary.completed,
            incomplete: summary.incomplete,
            total_items: summary.total_items,
            percent_complete: summary.run_metadata.then_some(summary.percent_complete),
        }
    }
}

/// Result of a library run that got as far as its summary.
#[derive(Debug, Clone)]
pub struct LibraryRun {
    /// Stats of every item that built, in completion order.
    pub stats: Vec<ItemStats>,
    pub summary: LibrarySummary,
    pub output_path: PathBuf,
    /// Whether the document was written to `output_path`.
    pub persisted: bool,
}

/// What became of one library in a multi-library run.
#[derive(Debug)]
pub struct LibraryOutcome {
    pub library_name: String,
    pub result: Result<LibraryRun, LibraryError>,
}

impl LibraryOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
