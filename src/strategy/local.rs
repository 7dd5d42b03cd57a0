use std::sync::{Mutex, RwLock};

use serde_json::Value;

use crate::lock::{lock_ignore_poison, read_ignore_poison, write_ignore_poison};
use crate::replier::Reply;
use crate::{log_trace, BusError, EventCallback, NotifyStrategy, ReplierRegistry, Result};

/// Publish events to the current context only.
///
/// This is the usual strategy for an application whose publishers and
/// subscribers live in the same process. Nothing is serialized and nothing
/// suspends: callbacks run in-line on the publishing thread and queries call
/// the registered handler directly.
#[derive(Default)]
pub struct LocalNotifyStrategy {
    // ---
    repliers: RwLock<ReplierRegistry>,
    callback: Mutex<Option<EventCallback>>,
}

impl LocalNotifyStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up and invoke a handler right now.
    ///
    /// # Errors
    ///
    /// [`BusError::MissingHandler`] if no handler is registered under `name`,
    /// or whatever the handler itself reports.
    pub fn query_now(&self, name: &str, params: Vec<Value>) -> Result<Reply> {
        // ---
        let replier = read_ignore_poison(&self.repliers)
            .get(name)
            .ok_or_else(|| BusError::MissingHandler(name.to_string()))?;

        replier.call(params)
    }
}

#[async_trait::async_trait]
impl NotifyStrategy for LocalNotifyStrategy {
    // ---
    fn init(&self, repliers: ReplierRegistry) {
        *write_ignore_poison(&self.repliers) = repliers;
    }

    fn notify_subscribers(&self, payload: Value) -> Result<()> {
        // ---
        // Clone out so the callback may publish again without deadlocking.
        let callback = lock_ignore_poison(&self.callback).clone();

        match callback {
            Some(cb) => cb(payload),
            None => log_trace!("local: event dropped, no callback registered"),
        }
        Ok(())
    }

    fn on_notify_subscribers(&self, callback: EventCallback) {
        *lock_ignore_poison(&self.callback) = Some(callback);
    }

    async fn query(&self, name: &str, params: Vec<Value>) -> Result<Value> {
        self.query_now(name, params)?.resolve().await
    }
}
