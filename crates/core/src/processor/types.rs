//! Types for the item processor.

use thiserror::Error;

use crate::builder::{BuilderError, ItemStats};
use crate::catalog::SourceError;

/// Why an item produced nothing without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The processor was handed no item.
    NoItem,
    /// The item's media kind has no builder.
    UnsupportedKind(String),
}

/// A single item's failure. Never escapes the processor.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("metadata resolution failed: {0}")]
    Metadata(#[from] SourceError),

    #[error("{0}")]
    Build(#[from] BuilderError),

    #[error("builder panicked: {0}")]
    Panicked(String),
}

/// Result of processing one item.
#[derive(Debug)]
pub enum ItemOutcome {
    Built(ItemStats),
    Skipped(SkipReason),
    Failed(ItemError),
}

impl ItemOutcome {
    /// Metrics label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Built(_) => "built",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    /// The stats, if the item was built.
    pub fn into_stats(self) -> Option<ItemStats> {
        match self {
            Self::Built(stats) => Some(stats),
            _ => None,
        }
    }
}
