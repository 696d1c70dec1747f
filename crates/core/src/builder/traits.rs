//! Trait definitions for the builder module.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::BuilderError;
use super::types::{BuildContext, ItemStats};
use crate::catalog::{MediaKind, MetadataRecord};
use crate::document::DocumentHandle;

/// Builds one item's document entry and asset statistics.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Returns the name of this builder implementation.
    fn name(&self) -> &str;

    /// Build the item and merge its entry into `doc`.
    ///
    /// Implementations only touch `doc` once everything else has succeeded.
    async fn build(
        &self,
        ctx: &BuildContext,
        doc: &DocumentHandle,
        meta: &MetadataRecord,
    ) -> Result<ItemStats, BuilderError>;
}

/// The builder variants, one per supported media kind.
#[derive(Clone)]
pub struct Builders {
    movie: Arc<dyn Builder>,
    tv: Arc<dyn Builder>,
}

impl Builders {
    pub fn new(movie: Arc<dyn Builder>, tv: Arc<dyn Builder>) -> Self {
        Self { movie, tv }
    }

    /// The builder for `kind`, or `None` for unsupported kinds.
    pub fn for_kind(&self, kind: MediaKind) -> Option<&Arc<dyn Builder>> {
        match kind {
            MediaKind::Movie => Some(&self.movie),
            MediaKind::Tv => Some(&self.tv),
            MediaKind::Unknown => None,
        }
    }
}

impl std::fmt::Debug for Builders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builders")
            .field("movie", &self.movie.name())
            .field("tv", &self.tv.name())
            .finish()
    }
}
