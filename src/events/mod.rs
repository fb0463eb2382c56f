//! Progress event routing
//!
//! This module provides the single shared progress channel, the event types
//! it carries, and the dispatch step that moves delivery onto a known
//! execution context.

pub mod bus;
pub mod dispatch;
pub mod types;

pub use bus::{EventHandler, ProgressEventBus, SubscriptionToken};
pub use dispatch::{DispatchJob, DispatchMode, EventDispatcher, InlineDispatcher, QueuedDispatcher};
pub use types::{ProgressEvent, ProgressEventKind, ProgressPayload, PROGRESS_CHANNEL};
