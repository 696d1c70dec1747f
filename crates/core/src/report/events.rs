use serde::{Deserialize, Serialize};

use crate::aggregator::LibrarySummary;

/// Processing events emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessingEvent {
    // Item events
    /// The processor was handed no item.
    NoItem,
    /// The item's media kind has no builder.
    UnsupportedType {
        full_title: String,
        media_kind: String,
    },
    /// Resolving or building one item failed; the item was skipped.
    ItemFailure {
        full_title: String,
        error: String,
    },

    // Library events
    /// Enumeration finished.
    LibraryItems {
        library_name: String,
        total_items: usize,
    },
    /// A prior document could not be parsed; the run starts from empty.
    ParseFailure {
        output_path: String,
        error: String,
    },
    /// The whole library run failed.
    LibraryFailure {
        library_name: String,
        error: String,
    },
    MetadataSaved {
        library_name: String,
        output_path: String,
    },
    CacheSaved {
        entries: usize,
    },
    /// Persisting the document failed; the run's results are not saved.
    WriteFailure {
        output_path: String,
        error: String,
    },
    CacheFailure {
        error: String,
    },
    /// Dry run: nothing persisted.
    DryRun {
        library_name: String,
    },
    LibrarySummary(LibrarySummary),
}

impl ProcessingEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::NoItem => "no_item",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::ItemFailure { .. } => "item_failure",
            Self::LibraryItems { .. } => "library_items",
            Self::ParseFailure { .. } => "parse_failure",
            Self::LibraryFailure { .. } => "library_failure",
            Self::MetadataSaved { .. } => "metadata_saved",
            Self::CacheSaved { .. } => "cache_saved",
            Self::WriteFailure { .. } => "write_failure",
            Self::CacheFailure { .. } => "cache_failure",
            Self::DryRun { .. } => "dry_run",
            Self::LibrarySummary(_) => "library_summary",
        }
    }

    /// Library the event belongs to, if it names one
    pub fn library_name(&self) -> Option<&str> {
        match self {
            Self::LibraryItems { library_name, .. }
            | Self::LibraryFailure { library_name, .. }
            | Self::MetadataSaved { library_name, .. }
            | Self::DryRun { library_name } => Some(library_name),
            Self::LibrarySummary(summary) => Some(&summary.library_name),
            _ => None,
        }
    }

    /// Whether the event reports something going wrong
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ItemFailure { .. }
                | Self::ParseFailure { .. }
                | Self::LibraryFailure { .. }
                | Self::WriteFailure { .. }
                | Self::CacheFailure { .. }
        )
    }
}
