use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::ProcessingEvent;

/// A processing event as it reaches the sink.
#[derive(Debug, Clone)]
pub struct ReportEnvelope {
    pub timestamp: DateTime<Utc>,
    /// Library the event was emitted for, if any.
    pub library: Option<String>,
    pub event: ProcessingEvent,
}

/// Cloneable sender of processing events.
///
/// A handle scoped with [`ReportHandle::for_library`] stamps every envelope
/// with that library's name.
#[derive(Debug, Clone)]
pub struct ReportHandle {
    tx: mpsc::Sender<ReportEnvelope>,
    library: Option<Arc<str>>,
}

impl ReportHandle {
    pub fn new(tx: mpsc::Sender<ReportEnvelope>) -> Self {
        Self { tx, library: None }
    }

    /// Same channel, attributed to `library_name`.
    pub fn for_library(&self, library_name: &str) -> Self {
        Self {
            tx: self.tx.clone(),
            library: Some(Arc::from(library_name)),
        }
    }

    pub fn library(&self) -> Option<&str> {
        self.library.as_deref()
    }

    /// Emit an event. A full channel applies backpressure; a closed one is
    /// logged and otherwise ignored.
    pub async fn emit(&self, event: ProcessingEvent) {
        let envelope = ReportEnvelope {
            timestamp: Utc::now(),
            library: self.library.as_deref().map(str::to_string),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit processing event: {}", e);
        }
    }
}
