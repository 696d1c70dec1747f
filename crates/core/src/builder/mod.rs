//! Builder module: turns one item's metadata into a document entry and
//! asset statistics.
//!
//! The pipeline dispatches to a [`Builder`] by media kind through
//! [`Builders`]. `LocalAssetBuilder` is the bundled implementation; it sizes
//! assets from a local asset directory and writes the item's fields into the
//! consolidated document.
//!
//! # Example
//!
//! ```ignore
//! use plexmeta_core::builder::LocalAssetBuilder;
//!
//! let builders = LocalAssetBuilder::builders(Some("assets".into()));
//! let stats = builders
//!     .for_kind(meta.media_kind)
//!     .unwrap()
//!     .build(&ctx, &doc, &meta)
//!     .await?;
//! println!("{}: {}% complete", stats.full_title, stats.percent);
//! ```

mod error;
mod local;
mod traits;
mod types;

pub use error::BuilderError;
pub use local::LocalAssetBuilder;
pub use traits::{Builder, Builders};
pub use types::{AssetRegistry, AssetStat, BuildContext, ItemStats};
