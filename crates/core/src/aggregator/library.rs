//! Library aggregator implementation.

use futures::{stream, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::builder::{AssetRegistry, BuildContext, Builders, ItemStats};
use crate::cache::MetadataCache;
use crate::catalog::{ItemHandle, Library, LookupCaches, MetadataRecord, MetadataSource};
use crate::config::{Config, FeatureFlags};
use crate::document::{self, ConsolidatedDocument, DocumentHandle};
use crate::metrics;
use crate::processor::ItemProcessor;
use crate::report::{ProcessingEvent, ReportHandle};

use super::summaries::SummaryCollector;
use super::types::{
    ClassificationMap, LibraryError, LibraryOutcome, LibraryRun, LibrarySummary, RunAccumulator,
    RunOptions,
};

/// Buffer between item tasks and the fold task.
const FOLD_BUFFER: usize = 256;

/// What the fold task hands back once every item task is done.
#[derive(Debug, Default)]
struct FoldResult {
    totals: RunAccumulator,
    stats: Vec<ItemStats>,
    /// Item tasks that finished, whatever their outcome.
    processed: usize,
}

/// Aggregates a library's items into its consolidated document.
///
/// One aggregator can run many libraries, one after another. `shutdown`
/// cancels the run in flight and every run after it.
pub struct LibraryAggregator {
    config: Arc<Config>,
    source: Arc<dyn MetadataSource>,
    processor: ItemProcessor,
    report: ReportHandle,
    cache: Option<Arc<dyn MetadataCache>>,
    caches: Option<Arc<LookupCaches>>,
    summaries: Option<SummaryCollector>,
    cancelled: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl LibraryAggregator {
    pub fn new(
        config: Arc<Config>,
        source: Arc<dyn MetadataSource>,
        builders: Builders,
        report: ReportHandle,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let processor = ItemProcessor::new(Arc::clone(&source), builders, report.clone());

        Self {
            config,
            source,
            processor,
            report,
            cache: None,
            caches: None,
            summaries: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Save lookup caches here after every persisted run.
    pub fn with_cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resolve metadata through these lookup caches.
    pub fn with_lookup_caches(mut self, caches: Arc<LookupCaches>) -> Self {
        self.processor = self.processor.with_caches(Arc::clone(&caches));
        self.caches = Some(caches);
        self
    }

    /// Record every summary into `summaries`.
    pub fn with_summaries(mut self, summaries: SummaryCollector) -> Self {
        self.summaries = Some(summaries);
        self
    }

    /// Cancel the run in flight. Nothing is written past this point.
    pub fn shutdown(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down library aggregator");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run every library in turn. A failed library never stops the others.
    pub async fn run_all(
        &self,
        libraries: Vec<Arc<dyn Library>>,
        options: &RunOptions,
    ) -> Vec<LibraryOutcome> {
        let mut outcomes = Vec::with_capacity(libraries.len());

        for library in libraries {
            if self.is_cancelled() {
                warn!("Skipping remaining libraries after shutdown");
                break;
            }
            let library_name = library.name().to_string();
            let result = self.run(library, options).await;
            outcomes.push(LibraryOutcome {
                library_name,
                result,
            });
        }

        outcomes
    }

    /// Aggregate one library.
    ///
    /// Any failure between enumeration and the summary ends the run with a
    /// `library_failure` event and no document write.
    pub async fn run(
        &self,
        library: Arc<dyn Library>,
        options: &RunOptions,
    ) -> Result<LibraryRun, LibraryError> {
        let library_name = library.name().to_string();
        info!("Processing library '{}'", library_name);

        let report = self.report.for_library(&library_name);
        let result = self
            .run_library(library, &library_name, options, &report)
            .await;
        match &result {
            Ok(run) => {
                let label = if run.persisted {
                    "saved"
                } else if options.flags.dry_run {
                    "dry_run"
                } else {
                    "write_failed"
                };
                metrics::LIBRARY_RUNS.with_label_values(&[label]).inc();
            }
            Err(e) => {
                metrics::LIBRARY_RUNS.with_label_values(&[e.label()]).inc();
                report
                    .emit(ProcessingEvent::LibraryFailure {
                        library_name: library_name.clone(),
                        error: e.to_string(),
                    })
                    .await;
            }
        }
        result
    }

    async fn run_library(
        &self,
        library: Arc<dyn Library>,
        library_name: &str,
        options: &RunOptions,
        report: &ReportHandle,
    ) -> Result<LibraryRun, LibraryError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if self.is_cancelled() {
            return Err(LibraryError::Cancelled);
        }

        // Enumeration blocks; keep it off the executor.
        let enumeration = tokio::task::spawn_blocking(move || library.all_items());
        let items = tokio::select! {
            joined = enumeration => joined.map_err(|e| LibraryError::Task(e.to_string()))??,
            _ = shutdown_rx.recv() => return Err(LibraryError::Cancelled),
        };
        let total_items = items.len();
        report
            .emit(ProcessingEvent::LibraryItems {
                library_name: library_name.to_string(),
                total_items,
            })
            .await;

        let records = tokio::select! {
            resolved = self.resolve_all(items) => resolved?,
            _ = shutdown_rx.recv() => return Err(LibraryError::Cancelled),
        };

        let mut classified = ClassificationMap::new();
        for record in &records {
            classified.insert(record.clone());
        }
        let kind = classified.dominant_kind();
        debug!(
            "Classified {} items of '{}' into {} entries, kind {}",
            total_items,
            library_name,
            classified.len(),
            kind
        );

        let output_path = document::output_path(&self.config.metadata.directory, kind);
        let doc = DocumentHandle::new(load_prior(report, &output_path).await);

        let ctx = BuildContext {
            config: Arc::clone(&self.config),
            flags: options.flags,
            ignored_fields: Arc::clone(&options.ignored_fields),
            library_name: library_name.to_string(),
            assets: AssetRegistry::new(),
        };

        let folded = self
            .fan_out(records, &doc, &ctx, options.flags, &mut shutdown_rx)
            .await?;
        if self.is_cancelled() {
            return Err(LibraryError::Cancelled);
        }

        let persisted = if options.flags.dry_run {
            report
                .emit(ProcessingEvent::DryRun {
                    library_name: library_name.to_string(),
                })
                .await;
            false
        } else {
            self.persist(report, library_name, &doc, &output_path).await
        };

        let summary = LibrarySummary::new(
            library_name,
            kind,
            total_items,
            &folded.totals,
            options.flags,
        );
        metrics::ASSET_BYTES.inc_by(summary.total_asset_size);
        report
            .emit(ProcessingEvent::LibrarySummary(summary.clone()))
            .await;
        if let Some(summaries) = &self.summaries {
            summaries.record(&summary, folded.processed).await;
        }

        Ok(LibraryRun {
            stats: folded.stats,
            summary,
            output_path,
            persisted,
        })
    }

    /// Resolve every item, keeping enumeration order.
    async fn resolve_all(
        &self,
        items: Vec<ItemHandle>,
    ) -> Result<Vec<MetadataRecord>, LibraryError> {
        let limit = match self.config.processing.max_concurrent_items {
            0 => items.len().max(1),
            n => n,
        };

        let records: Vec<MetadataRecord> = stream::iter(items)
            .map(|item| {
                let source = Arc::clone(&self.source);
                let caches = self.caches.clone();
                async move { source.resolve(&item, caches.as_deref()).await }
            })
            .buffered(limit)
            .try_collect()
            .await?;
        Ok(records)
    }

    /// Process every record concurrently and fold the results.
    async fn fan_out(
        &self,
        records: Vec<MetadataRecord>,
        doc: &DocumentHandle,
        ctx: &BuildContext,
        flags: FeatureFlags,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<FoldResult, LibraryError> {
        let (tx, rx) = mpsc::channel(FOLD_BUFFER);
        let fold = tokio::spawn(fold_results(rx, flags));

        let semaphore = match self.config.processing.max_concurrent_items {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        let mut tasks = JoinSet::new();
        for meta in records {
            let processor = self.processor.clone();
            let doc = doc.clone();
            let ctx = ctx.clone();
            let tx = tx.clone();
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let library_name = ctx.library_name.clone();
                let stats = processor
                    .build(meta, &doc, &ctx, &library_name)
                    .await
                    .into_stats();
                let _ = tx.send(stats).await;
            });
        }
        drop(tx);

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        tasks.abort_all();
                        fold.abort();
                        return Err(LibraryError::Task(e.to_string()));
                    }
                    None => break,
                },
                _ = shutdown_rx.recv() => {
                    info!("Library run received shutdown signal");
                    tasks.abort_all();
                    fold.abort();
                    return Err(LibraryError::Cancelled);
                }
            }
        }

        fold.await.map_err(|e| LibraryError::Task(e.to_string()))
    }

    /// Write the document, then the lookup cache. Failures are reported and
    /// never end the run.
    async fn persist(
        &self,
        report: &ReportHandle,
        library_name: &str,
        doc: &DocumentHandle,
        output_path: &Path,
    ) -> bool {
        let snapshot = doc.snapshot().await;
        if let Err(e) = snapshot.save(output_path).await {
            report
                .emit(ProcessingEvent::WriteFailure {
                    output_path: output_path.display().to_string(),
                    error: e.to_string(),
                })
                .await;
            return false;
        }

        report
            .emit(ProcessingEvent::MetadataSaved {
                library_name: library_name.to_string(),
                output_path: output_path.display().to_string(),
            })
            .await;

        // Shutdown may land while the document is being written.
        if self.is_cancelled() {
            warn!("Shutdown requested; lookup cache for '{}' not saved", library_name);
            return true;
        }
        self.save_cache(report).await;
        true
    }

    async fn save_cache(&self, report: &ReportHandle) {
        let Some(cache) = &self.cache else {
            return;
        };

        let state = match &self.caches {
            Some(caches) => Ok(caches.to_state().await),
            None => cache.load(),
        };
        let result = state.and_then(|state| cache.save(&state).map(|()| state.len()));

        let event = match result {
            Ok(entries) => ProcessingEvent::CacheSaved { entries },
            Err(e) => ProcessingEvent::CacheFailure {
                error: e.to_string(),
            },
        };
        report.emit(event).await;
    }
}

/// The document persisted by a previous run, or an empty one.
async fn load_prior(report: &ReportHandle, output_path: &Path) -> ConsolidatedDocument {
    match ConsolidatedDocument::load(output_path).await {
        Ok(Some(doc)) => {
            debug!(
                "Loaded {} existing entries from {}",
                doc.len(),
                output_path.display()
            );
            doc
        }
        Ok(None) => ConsolidatedDocument::new(),
        Err(e) => {
            report
                .emit(ProcessingEvent::ParseFailure {
                    output_path: output_path.display().to_string(),
                    error: e.to_string(),
                })
                .await;
            ConsolidatedDocument::new()
        }
    }
}

/// Sole owner of the run's totals; item tasks only ever send to it.
async fn fold_results(mut rx: mpsc::Receiver<Option<ItemStats>>, flags: FeatureFlags) -> FoldResult {
    let mut result = FoldResult::default();
    while let Some(stats) = rx.recv().await {
        result.processed += 1;
        if let Some(stats) = stats {
            result.totals.fold(&stats, flags);
            result.stats.push(stats);
        }
    }
    result
}
