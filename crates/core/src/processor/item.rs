//! Item processor implementation.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::builder::{BuildContext, Builders, ItemStats};
use crate::catalog::{
    is_unknown_library, ItemHandle, LookupCaches, MetadataRecord, MetadataSource,
};
use crate::document::DocumentHandle;
use crate::metrics;
use crate::report::{ProcessingEvent, ReportHandle};

use super::types::{ItemError, ItemOutcome, SkipReason};

/// Processes single catalog items.
///
/// Cheap to clone; every item task of a run holds its own copy.
#[derive(Clone)]
pub struct ItemProcessor {
    source: Arc<dyn MetadataSource>,
    builders: Builders,
    report: ReportHandle,
    caches: Option<Arc<LookupCaches>>,
}

impl ItemProcessor {
    pub fn new(source: Arc<dyn MetadataSource>, builders: Builders, report: ReportHandle) -> Self {
        Self {
            source,
            builders,
            report,
            caches: None,
        }
    }

    /// Resolve through these lookup caches.
    pub fn with_caches(mut self, caches: Arc<LookupCaches>) -> Self {
        self.caches = Some(caches);
        self
    }

    /// Process one item, returning its stats or nothing.
    pub async fn process(
        &self,
        item: Option<ItemHandle>,
        doc: &DocumentHandle,
        ctx: &BuildContext,
        library_hint: &str,
    ) -> Option<ItemStats> {
        self.try_process(item, doc, ctx, library_hint)
            .await
            .into_stats()
    }

    /// Process one item and report exactly what happened to it.
    pub async fn try_process(
        &self,
        item: Option<ItemHandle>,
        doc: &DocumentHandle,
        ctx: &BuildContext,
        library_hint: &str,
    ) -> ItemOutcome {
        let Some(item) = item else {
            self.report
                .for_library(&ctx.library_name)
                .emit(ProcessingEvent::NoItem)
                .await;
            return self.finish(ItemOutcome::Skipped(SkipReason::NoItem));
        };

        let meta = match self.source.resolve(&item, self.caches.as_deref()).await {
            Ok(meta) => meta,
            Err(e) => {
                let error = ItemError::Metadata(e);
                self.report
                    .for_library(&ctx.library_name)
                    .emit(ProcessingEvent::ItemFailure {
                        full_title: item.rating_key().to_string(),
                        error: error.to_string(),
                    })
                    .await;
                return self.finish(ItemOutcome::Failed(error));
            }
        };

        self.build(meta, doc, ctx, library_hint).await
    }

    /// Dispatch an already-resolved record to its builder.
    pub async fn build(
        &self,
        meta: MetadataRecord,
        doc: &DocumentHandle,
        ctx: &BuildContext,
        library_hint: &str,
    ) -> ItemOutcome {
        let full_title = meta.full_title();
        // An unknown hint defers to the library named by the metadata.
        let ctx = if is_unknown_library(library_hint) {
            ctx.for_library(&meta.library_name)
        } else {
            ctx.for_library(library_hint)
        };
        let report = self.report.for_library(&ctx.library_name);

        let Some(builder) = self.builders.for_kind(meta.media_kind) else {
            report
                .emit(ProcessingEvent::UnsupportedType {
                    full_title,
                    media_kind: meta.media_kind.to_string(),
                })
                .await;
            return self.finish(ItemOutcome::Skipped(SkipReason::UnsupportedKind(
                meta.media_kind.to_string(),
            )));
        };

        debug!(
            "Building {} with {} for library '{}'",
            full_title,
            builder.name(),
            ctx.library_name
        );

        let started = Instant::now();
        let result = AssertUnwindSafe(builder.build(&ctx, doc, &meta))
            .catch_unwind()
            .await;
        metrics::ITEM_DURATION
            .with_label_values(&[meta.media_kind.as_str()])
            .observe(started.elapsed().as_secs_f64());

        let error = match result {
            Ok(Ok(stats)) => return self.finish(ItemOutcome::Built(stats)),
            Ok(Err(e)) => ItemError::Build(e),
            Err(payload) => ItemError::Panicked(panic_message(payload.as_ref())),
        };

        report
            .emit(ProcessingEvent::ItemFailure {
                full_title,
                error: error.to_string(),
            })
            .await;
        self.finish(ItemOutcome::Failed(error))
    }

    fn finish(&self, outcome: ItemOutcome) -> ItemOutcome {
        metrics::ITEMS_PROCESSED
            .with_label_values(&[outcome.label()])
            .inc();
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
