//! Notify strategies.
//!
//! A strategy is the pluggable transport behind a channel. It carries
//! fire-and-forget events to a single registered callback and answers
//! named queries using a [`ReplierRegistry`](crate::ReplierRegistry).
//!
//! Two variants exist:
//!
//! - [`LocalNotifyStrategy`]: everything happens in-line in the caller's
//!   context. Events reach the local callback immediately and queries call
//!   the local handler directly.
//! - [`BroadcastNotifyStrategy`]: events and queries travel over a named
//!   broadcast channel to every *other* participant. Queries are matched to
//!   responses by name and bounded by a timeout.

mod broadcast;
mod local;
mod pending;

use std::sync::Arc;

use serde_json::Value;

use crate::{ReplierRegistry, Result};

pub use broadcast::{BroadcastNotifyStrategy, BroadcastOptions, DEFAULT_QUERY_TIMEOUT};
pub use local::LocalNotifyStrategy;

/// Callback invoked with every event payload a strategy receives.
pub type EventCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// The contract shared by all strategies.
///
/// # Notes
///
/// This trait uses `async_trait` so it stays object safe; treat `query` as
/// a normal `async fn`.
#[async_trait::async_trait]
pub trait NotifyStrategy: Send + Sync {
    // ---
    /// Install the replier registry, replacing any previous one.
    fn init(&self, repliers: ReplierRegistry);

    /// Deliver an event payload. No delivery confirmation.
    ///
    /// Only transport faults are reported.
    fn notify_subscribers(&self, payload: Value) -> Result<()>;

    /// Register the one callback that receives event payloads.
    ///
    /// The last registration wins.
    fn on_notify_subscribers(&self, callback: EventCallback);

    /// Issue a named query with positional parameters.
    async fn query(&self, name: &str, params: Vec<Value>) -> Result<Value>;
}

/// Shared strategy pointer.
pub type StrategyPtr = Arc<dyn NotifyStrategy>;
