//! Mock library for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::catalog::{CatalogError, ItemHandle, Library};

/// Mock implementation of the Library trait.
///
/// Provides controllable behavior for testing:
/// - A fixed item list
/// - Simulated enumeration failure
/// - Simulated enumeration latency (blocks the calling thread)
#[derive(Debug)]
pub struct MockLibrary {
    name: String,
    items: Arc<Mutex<Vec<ItemHandle>>>,
    /// If set, enumeration fails with this message.
    failure: Arc<Mutex<Option<String>>>,
    latency: Arc<Mutex<Duration>>,
    enumerations: AtomicUsize,
}

impl MockLibrary {
    /// Create a library holding one item per rating key.
    pub fn new<I, S>(name: &str, rating_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            items: Arc::new(Mutex::new(
                rating_keys.into_iter().map(ItemHandle::new).collect(),
            )),
            failure: Arc::new(Mutex::new(None)),
            latency: Arc::new(Mutex::new(Duration::ZERO)),
            enumerations: AtomicUsize::new(0),
        }
    }

    /// Create a library with no items.
    pub fn empty(name: &str) -> Self {
        Self::new(name, Vec::<String>::new())
    }

    /// Make enumeration fail.
    pub fn set_failure(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Block every enumeration for `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Number of times `all_items` was called.
    pub fn enumeration_count(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }
}

impl Library for MockLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn all_items(&self) -> Result<Vec<ItemHandle>, CatalogError> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(CatalogError::Enumeration(message));
        }
        Ok(self.items.lock().unwrap().clone())
    }
}
