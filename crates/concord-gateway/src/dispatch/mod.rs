//! Event dispatch
//!
//! Decodes each shard's dispatches in sequence order, applies them to the
//! cache and hands the resulting events to the user's handler.

mod dispatcher;
mod handler;
mod readiness;

pub use dispatcher::EventDispatcher;
pub use handler::{Context, EventHandler, HandlerError};
pub(crate) use readiness::ReadyTracker;
