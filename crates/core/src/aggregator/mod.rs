//! Library aggregator: runs a whole catalog library through the item
//! processor and persists its consolidated document.
//!
//! A run enumerates the library off the executor, resolves and classifies
//! every item, fans the items out to concurrent tasks and folds their stats
//! in a single task that owns the run's totals. The document is written only
//! once every task has finished, and never after `shutdown`.
//!
//! # Example
//!
//! ```ignore
//! use plexmeta_core::aggregator::{LibraryAggregator, RunOptions};
//!
//! let aggregator = LibraryAggregator::new(config.clone(), source, builders, report);
//! let run = aggregator.run(library, &RunOptions::from_config(&config)).await?;
//! println!("{}% complete", run.summary.percent_complete);
//! ```

mod library;
mod summaries;
mod types;

pub use library::LibraryAggregator;
pub use summaries::SummaryCollector;
pub use types::{
    percent_complete, ClassificationMap, LibraryError, LibraryOutcome, LibraryRun,
    LibrarySummary, MetadataSummary, RunAccumulator, RunOptions,
};
