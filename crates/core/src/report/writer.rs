use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{ProcessingEvent, ReportEnvelope, ReportHandle};

/// Destination for rendered processing events.
pub trait ReportSink: Send + Sync {
    fn record(&self, envelope: &ReportEnvelope);
}

/// Renders events as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn record(&self, envelope: &ReportEnvelope) {
        let library = envelope.library.as_deref().unwrap_or_default();
        match &envelope.event {
            ProcessingEvent::NoItem => info!(library, "No item to process, skipping"),
            ProcessingEvent::UnsupportedType {
                full_title,
                media_kind,
            } => info!(
                library,
                "Skipping {}: unsupported type '{}'", full_title, media_kind
            ),
            ProcessingEvent::ItemFailure { full_title, error } => {
                error!(library, "Failed to process {}: {}", full_title, error)
            }
            ProcessingEvent::LibraryItems {
                library_name,
                total_items,
            } => info!("Processing {} items in library '{}'", total_items, library_name),
            ProcessingEvent::ParseFailure { output_path, error } => {
                warn!(library, "Failed to parse existing {}: {}", output_path, error)
            }
            ProcessingEvent::LibraryFailure {
                library_name,
                error,
            } => error!("Failed to process library '{}': {}", library_name, error),
            ProcessingEvent::MetadataSaved {
                library_name,
                output_path,
            } => info!("Saved metadata for '{}' to {}", library_name, output_path),
            ProcessingEvent::CacheSaved { entries } => {
                info!(library, "Saved lookup cache ({} entries)", entries)
            }
            ProcessingEvent::WriteFailure { output_path, error } => {
                error!(library, "Failed to write {}: {}", output_path, error)
            }
            ProcessingEvent::CacheFailure { error } => {
                error!(library, "Failed to save lookup cache: {}", error)
            }
            ProcessingEvent::DryRun { library_name } => {
                info!("Dry run: metadata for '{}' not saved", library_name)
            }
            ProcessingEvent::LibrarySummary(summary) => {
                if summary.run_metadata {
                    info!(
                        "{}: {}/{} items complete ({:.2}%), {} incomplete",
                        summary.library_name,
                        summary.completed,
                        summary.total_items,
                        summary.percent_complete,
                        summary.incomplete
                    );
                }
                info!(
                    "{}: assets {} bytes (posters {}, backgrounds {}, season posters {})",
                    summary.library_name,
                    summary.total_asset_size,
                    summary.poster_size,
                    summary.background_size,
                    summary.season_poster_size
                );
            }
        }
    }
}

/// Background task that receives processing events and hands them to a sink
pub struct ReportWriter {
    rx: mpsc::Receiver<ReportEnvelope>,
    sink: Arc<dyn ReportSink>,
}

impl ReportWriter {
    /// Create a new report writer
    pub fn new(rx: mpsc::Receiver<ReportEnvelope>, sink: Arc<dyn ReportSink>) -> Self {
        Self { rx, sink }
    }

    /// Run the writer, consuming events until every handle is dropped
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::debug!("Report writer started");

        while let Some(envelope) = self.rx.recv().await {
            self.sink.record(&envelope);
        }

        tracing::debug!("Report writer shutting down");
    }
}

/// Create a complete report system
///
/// Returns:
/// - `ReportHandle` - for emitting events (clone this to share across tasks)
/// - `ReportWriter` - spawn this as a background task with `tokio::spawn(writer.run())`
pub fn create_report_system(
    sink: Arc<dyn ReportSink>,
    buffer_size: usize,
) -> (ReportHandle, ReportWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = ReportHandle::new(tx);
    let writer = ReportWriter::new(rx, sink);
    (handle, writer)
}
