//! Processing events and the channel that carries them to a sink.

mod events;
mod handle;
mod writer;

pub use events::*;
pub use handle::*;
pub use writer::*;
