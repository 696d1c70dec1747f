//! Catalog access: library enumeration and per-item metadata resolution.
//!
//! The pipeline only ever sees the two traits defined here. `SnapshotCatalog`
//! implements both over a JSON export of the catalog, and `LookupCaches`
//! holds the kind-specific caches a source may consult.

mod lookup;
mod snapshot;
mod types;

pub use lookup::LookupCaches;
pub use snapshot::{SnapshotCatalog, SnapshotLibrary};
pub use types::*;

use async_trait::async_trait;

/// A named catalog section.
pub trait Library: Send + Sync {
    /// Display name of the library.
    fn name(&self) -> &str;

    /// Enumerate every item in the library.
    ///
    /// This is a blocking call and may be slow; callers run it off the async
    /// executor.
    fn all_items(&self) -> Result<Vec<ItemHandle>, CatalogError>;
}

/// Resolves an item handle into its metadata record.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Resolve metadata, consulting `caches` when supplied.
    ///
    /// Items that cannot be classified resolve with `MediaKind::Unknown`
    /// rather than failing.
    async fn resolve(
        &self,
        item: &ItemHandle,
        caches: Option<&LookupCaches>,
    ) -> Result<MetadataRecord, SourceError>;
}
