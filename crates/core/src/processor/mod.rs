//! Item processor: resolves one item's metadata and hands it to the builder
//! for its media kind.
//!
//! Every failure below this boundary, including a builder panic, becomes an
//! [`ItemOutcome::Failed`] and an `item_failure` event. Nothing propagates to
//! the caller.

mod item;
mod types;

pub use item::ItemProcessor;
pub use types::{ItemError, ItemOutcome, SkipReason};
